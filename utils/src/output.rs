use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Context;
use cpal::traits::{DeviceTrait, StreamTrait};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapProd, HeapRb};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

use crate::device;

const RESAMPLER_CHUNK_SIZE: usize = 1024;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Splits samples into fixed-size chunks, zero-padding the last one.
pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples
        .chunks(chunk_size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(chunk_size, 0.0);
            chunk
        })
        .collect()
}

/// Resamples a whole mono utterance.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> anyhow::Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    let mut resampler = create_resampler(from_rate as f64, to_rate as f64, RESAMPLER_CHUNK_SIZE)?;
    let mut out = Vec::with_capacity(samples.len() * to_rate as usize / from_rate as usize + 1);
    for chunk in split_for_chunks(samples, resampler.input_frames_next()) {
        let resampled = resampler.process(&[chunk.as_slice()], None)?;
        if let Some(channel) = resampled.first() {
            out.extend_from_slice(channel);
        }
    }
    Ok(out)
}

/// Owns a cpal output stream fed from a ring buffer, on a dedicated thread.
///
/// `on_drained` runs on the audio thread each time the buffer runs dry after
/// having played something; it must not block.
pub struct OutputThread {
    producer: HeapProd<f32>,
    flush: Arc<AtomicBool>,
    stop: Option<std_mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    sample_rate: u32,
}

impl OutputThread {
    pub fn start<F>(device_name: Option<String>, latency_ms: usize, on_drained: F) -> anyhow::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let (ready_tx, ready_rx) = std_mpsc::channel::<anyhow::Result<(HeapProd<f32>, u32)>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let flush = Arc::new(AtomicBool::new(false));
        let stream_flush = flush.clone();

        let handle = std::thread::Builder::new()
            .name("speech-output".to_string())
            .spawn(move || {
                let stream = match build_output_stream(
                    device_name.as_deref(),
                    latency_ms,
                    stream_flush,
                    on_drained,
                ) {
                    Ok((stream, producer, sample_rate)) => {
                        let _ = ready_tx.send(Ok((producer, sample_rate)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = stop_rx.recv();
                drop(stream);
                tracing::debug!("output stream released");
            })
            .context("failed to spawn output thread")?;

        let (producer, sample_rate) = ready_rx
            .recv()
            .context("output thread exited before reporting")??;

        Ok(Self {
            producer,
            flush,
            stop: Some(stop_tx),
            handle: Some(handle),
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Queues as many samples as fit and returns how many were taken.
    pub fn push(&mut self, samples: &[f32]) -> usize {
        self.producer.push_slice(samples)
    }

    pub fn is_drained(&self) -> bool {
        self.producer.is_empty()
    }

    /// Discards whatever is buffered; takes effect on the next audio callback.
    pub fn flush(&self) {
        self.flush.store(true, Ordering::Release);
    }

    pub fn stop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("output thread panicked");
            }
        }
    }
}

impl Drop for OutputThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_output_stream<F>(
    device_name: Option<&str>,
    latency_ms: usize,
    flush: Arc<AtomicBool>,
    on_drained: F,
) -> anyhow::Result<(cpal::Stream, HeapProd<f32>, u32)>
where
    F: Fn() + Send + 'static,
{
    let output = device::get_or_default_output(device_name)?;
    tracing::info!("Using output device: {:?}", output.name().unwrap_or_default());

    let supported = output
        .default_output_config()
        .context("failed to get default output config")?;
    if supported.sample_format() != cpal::SampleFormat::F32 {
        anyhow::bail!("unsupported output sample format {:?}", supported.sample_format());
    }
    let config: cpal::StreamConfig = supported.into();
    let channel_count = config.channels as usize;
    let sample_rate = config.sample_rate.0;
    tracing::debug!("Output stream config: {:?}", &config);

    let capacity = (sample_rate as usize * latency_ms / 1000).max(1);
    let (producer, mut consumer) = HeapRb::<f32>::new(capacity).split();

    let mut had_audio = false;
    let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        if flush.swap(false, Ordering::AcqRel) {
            consumer.clear();
        }
        let mut played = false;
        // Same mono sample on every channel of the frame.
        for frame in data.chunks_mut(channel_count.max(1)) {
            let sample = match consumer.try_pop() {
                Some(sample) => {
                    played = true;
                    sample
                }
                None => 0.0,
            };
            frame.fill(sample);
        }
        had_audio |= played;
        if had_audio && consumer.is_empty() {
            had_audio = false;
            on_drained();
        }
    };

    let stream = output
        .build_output_stream(
            &config,
            output_data_fn,
            |err| tracing::error!("An error occurred on output stream: {}", err),
            None,
        )
        .context("failed to build output stream")?;
    stream.play().context("failed to start output stream")?;

    Ok((stream, producer, sample_rate))
}
