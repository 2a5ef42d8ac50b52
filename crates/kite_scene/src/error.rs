use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum SceneError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),
}

#[derive(thiserror::Error, Debug)]
pub enum ScriptError {
    #[error("Failed to read script {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),
    #[error("Script {} must return a table", .0.display())]
    NotATable(PathBuf),
}
