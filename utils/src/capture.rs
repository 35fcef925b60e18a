use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;

use anyhow::Context;
use cpal::traits::{DeviceTrait, StreamTrait};

use crate::audio;
use crate::device;

/// Shape of the samples handed to the capture callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    /// Always 1: frames are downmixed before delivery.
    pub channels: u16,
}

/// Owns a cpal input stream on a dedicated thread.
///
/// `cpal::Stream` is not `Send` on every platform, so the stream never leaves the
/// thread that built it. Dropping or stopping the handle drops the stream, which
/// releases the hardware.
pub struct CaptureThread {
    stop: Option<std_mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    format: CaptureFormat,
}

impl CaptureThread {
    /// Opens the device and starts delivering mono samples to `on_samples`.
    ///
    /// Blocks until the stream is running or has failed to start.
    pub fn start<F>(device_name: Option<String>, on_samples: F) -> anyhow::Result<Self>
    where
        F: FnMut(&[f32]) + Send + 'static,
    {
        let (ready_tx, ready_rx) = std_mpsc::channel::<anyhow::Result<CaptureFormat>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let handle = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || {
                let stream = match build_input_stream(device_name.as_deref(), on_samples) {
                    Ok((stream, format)) => {
                        let _ = ready_tx.send(Ok(format));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Park until stop() is called or the sender is dropped.
                let _ = stop_rx.recv();
                drop(stream);
                tracing::debug!("capture stream released");
            })
            .context("failed to spawn capture thread")?;

        let format = ready_rx
            .recv()
            .context("capture thread exited before reporting")??;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
            format,
        })
    }

    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    /// Stops the stream and waits for the device to be released. Idempotent.
    pub fn stop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("capture thread panicked");
            }
        }
    }
}

impl Drop for CaptureThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn build_input_stream<F>(
    device_name: Option<&str>,
    mut on_samples: F,
) -> anyhow::Result<(cpal::Stream, CaptureFormat)>
where
    F: FnMut(&[f32]) + Send + 'static,
{
    let input = device::get_or_default_input(device_name)?;
    tracing::info!("Using input device: {:?}", input.name().unwrap_or_default());

    let supported = input
        .default_input_config()
        .context("failed to get default input config")?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let channels = config.channels as usize;
    tracing::debug!("Input stream config: {:?}", &config);

    let err_fn = |err| tracing::error!("An error occurred on input stream: {}", err);
    let stream = match sample_format {
        cpal::SampleFormat::F32 => input.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                on_samples(&audio::downmix(data, channels));
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => input.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let data = audio::convert_i16_to_f32(data);
                on_samples(&audio::downmix(&data, channels));
            },
            err_fn,
            None,
        ),
        other => anyhow::bail!("unsupported input sample format {:?}", other),
    }
    .context("failed to build input stream")?;

    stream.play().context("failed to start input stream")?;

    Ok((
        stream,
        CaptureFormat {
            sample_rate: config.sample_rate.0,
            channels: 1,
        },
    ))
}
