use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A generation manifest: which files to produce under which project root.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationPlan {
    /// Absolute project directory; every file is confined under this root.
    pub root: PathBuf,
    /// Files to write (generate) or remove (destroy).
    pub files: Vec<FileSpec>,
    /// Project file index to refresh after the run (relative to root).
    #[serde(default)]
    pub index: Option<PathBuf>,
}

/// One output file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileSpec {
    /// Path relative to root.
    pub path: PathBuf,
    /// Rendered file content. Ignored by destroy.
    #[serde(default)]
    pub content: String,
}

impl GenerationPlan {
    /// Validate the plan (basic sanity checks).
    pub fn validate(&self) -> Result<()> {
        if !self.root.is_absolute() {
            anyhow::bail!("root must be an absolute path");
        }
        for file in &self.files {
            if file.path.as_os_str().is_empty() {
                anyhow::bail!("file path must not be empty");
            }
        }
        if let Some(index) = &self.index
            && index.as_os_str().is_empty()
        {
            anyhow::bail!("index path must not be empty");
        }
        Ok(())
    }

    pub fn content_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.content.len() as u64).sum()
    }
}

/// Anything that can produce rendered output files.
pub trait Generator {
    /// Output paths (relative to the project root) and their contents.
    fn files(&self) -> Result<Vec<(PathBuf, String)>>;
}

impl Generator for GenerationPlan {
    fn files(&self) -> Result<Vec<(PathBuf, String)>> {
        Ok(self
            .files
            .iter()
            .map(|f| (f.path.clone(), f.content.clone()))
            .collect())
    }
}

/// Generate JSON Schema for the GenerationPlan type.
pub fn generate_schema() -> Result<String> {
    let schema = schemars::schema_for!(GenerationPlan);
    Ok(serde_json::to_string_pretty(&schema)?)
}

/// Load a GenerationPlan from a JSON file.
pub fn load_plan(path: &std::path::Path) -> Result<GenerationPlan> {
    let json = std::fs::read_to_string(path)?;
    from_json(&json)
}

/// Create a GenerationPlan from a JSON string.
pub fn from_json(json: &str) -> Result<GenerationPlan> {
    let plan = serde_json::from_str(json)?;
    Ok(plan)
}
