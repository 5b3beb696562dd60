use crate::errors::SelectionError;
use crate::models::VideoInfo;

/// Remembers which variant of the current video the user picked.
#[derive(Debug, Clone, Default)]
pub struct VariantSelector {
    selected: Option<String>,
}

impl VariantSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Falls back to the first offered variant.
    pub fn reset(&mut self, info: &VideoInfo) {
        self.selected = info.variants.first().map(|v| v.id.clone());
    }

    pub fn select(&mut self, info: &VideoInfo, id: &str) -> Result<(), SelectionError> {
        if info.variant(id).is_none() {
            return Err(SelectionError::InvalidSelection(id.to_string()));
        }
        self.selected = Some(id.to_string());
        Ok(())
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }
}
