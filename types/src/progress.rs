/// Position of the learner within the module, as last reported by the service.
///
/// Each `progress` event replaces the previous snapshot wholesale.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Progress {
    section_index: usize,
    total_sections: usize,
    #[serde(default)]
    section_title: String,
    step_index: usize,
    /// Not every service build reports this.
    #[serde(default)]
    step_count: Option<usize>,
}

impl Progress {
    pub fn new(
        section_index: usize,
        total_sections: usize,
        section_title: &str,
        step_index: usize,
        step_count: Option<usize>,
    ) -> Self {
        Self {
            section_index,
            total_sections,
            section_title: section_title.to_string(),
            step_index,
            step_count,
        }
    }

    pub fn section_index(&self) -> usize {
        self.section_index
    }

    pub fn total_sections(&self) -> usize {
        self.total_sections
    }

    pub fn section_title(&self) -> &str {
        &self.section_title
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn step_count(&self) -> Option<usize> {
        self.step_count
    }

    /// Whether the snapshot satisfies `section_index < total_sections`.
    pub fn is_consistent(&self) -> bool {
        self.section_index < self.total_sections
    }

    /// Share of sections finished, always within `0.0..=1.0`.
    pub fn fraction(&self) -> f32 {
        if self.total_sections == 0 {
            return 0.0;
        }
        (self.section_index as f32 / self.total_sections as f32).clamp(0.0, 1.0)
    }
}

/// `section_complete` payload; shown briefly, then cleared.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SectionComplete {
    section_index: usize,
    #[serde(default)]
    section_title: String,
    /// Anything else the service attaches.
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl SectionComplete {
    pub fn new(section_index: usize, section_title: &str) -> Self {
        Self {
            section_index,
            section_title: section_title.to_string(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn section_index(&self) -> usize {
        self.section_index
    }

    pub fn section_title(&self) -> &str {
        &self.section_title
    }

    pub fn extra(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.extra
    }
}

/// One entry of the `curriculum_info` outline.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SectionOutline {
    index: usize,
    title: String,
    #[serde(default)]
    title_hi: Option<String>,
    step_count: usize,
}

impl SectionOutline {
    pub fn new(index: usize, title: &str, step_count: usize) -> Self {
        Self {
            index,
            title: title.to_string(),
            title_hi: None,
            step_count,
        }
    }

    pub fn with_title_hi(mut self, title_hi: &str) -> Self {
        self.title_hi = Some(title_hi.to_string());
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn title_hi(&self) -> Option<&str> {
        self.title_hi.as_deref()
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }
}

/// `curriculum_info` payload: the section outline of the module.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CurriculumInfo {
    sections: Vec<SectionOutline>,
}

impl CurriculumInfo {
    pub fn new(sections: Vec<SectionOutline>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[SectionOutline] {
        &self.sections
    }
}
