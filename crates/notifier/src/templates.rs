//! Template lookup

use std::path::{Component, Path, PathBuf};

use keycycle_core::NotifyError;

/// Reads templates from `{dir}/{template_id}`
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    /// Store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Template directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a template id resolves to. Ids must stay inside the directory.
    pub fn path_for(&self, template_id: &str) -> Result<PathBuf, NotifyError> {
        let id = Path::new(template_id);
        let confined = !template_id.is_empty()
            && id.components().all(|c| matches!(c, Component::Normal(_)));
        if !confined {
            return Err(NotifyError::InvalidMessage(format!(
                "template id {template_id:?} must be a relative path inside the template directory"
            )));
        }
        Ok(self.dir.join(id))
    }

    /// Load a template's contents
    pub async fn load(&self, template_id: &str) -> Result<String, NotifyError> {
        let path = self.path_for(template_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                tracing::debug!(template_id, path = %path.display(), "Loaded template");
                Ok(contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(NotifyError::TemplateNotFound {
                    template_id: template_id.to_string(),
                    path,
                })
            }
            Err(source) => Err(NotifyError::TemplateRead { path, source }),
        }
    }
}
