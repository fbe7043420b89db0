//! File capability module — browse, read, write, and delete files.
//!
//! Reads are allowed anywhere under the configured base directory; writes
//! and the files they produce are confined to the `AI_Workspace`
//! subdirectory. Every path is normalized and prefix-checked against the
//! base directory, and `..` components are refused outright.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tracing::warn;

use skyhook_core::client::{GenerateClient, GenerateRequest, ToolDeclaration};
use skyhook_core::module::{CapabilityModule, Dispatch, ToolCall, ToolOutput};
use skyhook_core::tier::ModelTier;
use skyhook_core::transcript::Turn;

/// Subdirectory of the base dir that write_file is confined to.
const OUTPUT_DIR: &str = "AI_Workspace";

/// Pre-read size cap for both text and image files.
const MAX_READ_BYTES: u64 = 10 * 1024 * 1024;

const MAX_TREE_DEPTH: usize = 3;

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "csv", "json", "cs", "rs", "toml", "yaml", "yml", "log", "xml", "html",
];

pub struct FileModule {
    /// Canonicalized root every path resolves against.
    base_dir: PathBuf,

    /// Fast-tier client used for `summary_query` condensation, when
    /// available.
    fast_client: Option<Arc<dyn GenerateClient>>,
}

enum ReadOutcome {
    Text(String),
    Image { mime_type: String, bytes: Vec<u8> },
}

impl FileModule {
    /// Create the module rooted at `base_dir`, ensuring the output
    /// subdirectory exists.
    pub fn new(base_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let base_dir = base_dir.as_ref().canonicalize()?;
        std::fs::create_dir_all(base_dir.join(OUTPUT_DIR))?;
        Ok(Self {
            base_dir,
            fast_client: None,
        })
    }

    /// Enable `summary_query` handling through the given fast-tier client.
    pub fn with_fast_client(mut self, client: Arc<dyn GenerateClient>) -> Self {
        self.fast_client = Some(client);
        self
    }

    /// Resolve a model-supplied relative path, refusing anything that
    /// escapes the base directory.
    fn resolve(&self, relative: &str) -> Result<PathBuf, String> {
        if relative.contains("..") {
            return Err("Error: parent directory access is not allowed.".into());
        }
        let joined = self.base_dir.join(relative);
        let resolved = joined
            .canonicalize()
            .map_err(|_| format!("Error: path '{relative}' does not exist."))?;
        if !resolved.starts_with(&self.base_dir) {
            return Err("Error: path is outside the allowed directory.".into());
        }
        Ok(resolved)
    }

    fn list_files(&self, sub_path: &str) -> String {
        let target = match self.resolve(sub_path) {
            Ok(p) => p,
            Err(e) => return e,
        };
        if !target.is_dir() {
            return format!("Error: path '{sub_path}' is not a directory.");
        }

        let mut out = format!("[Folder Tree: {sub_path}]\n");
        build_tree(&target, 0, &mut out);
        if out.lines().count() == 1 {
            out.push_str("(this directory is empty)\n");
        }
        out
    }

    async fn read_file(&self, file_name: &str) -> Result<ReadOutcome, String> {
        let path = self.resolve(file_name)?;
        if !path.is_file() {
            return Err(format!("Error: file '{file_name}' not found."));
        }

        let size = path
            .metadata()
            .map_err(|e| format!("Error: could not read file metadata. {e}"))?
            .len();
        if size > MAX_READ_BYTES {
            return Err(format!(
                "Error: file is too large ({}), exceeds the 10MB limit.",
                format_size(size)
            ));
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if TEXT_EXTENSIONS.contains(&extension.as_str()) {
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| format!("Error: could not read file. {e}"))?;
            Ok(ReadOutcome::Text(content))
        } else if let Some(mime_type) = image_mime_type(&extension) {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| format!("Error: could not read file. {e}"))?;
            Ok(ReadOutcome::Image {
                mime_type: mime_type.into(),
                bytes,
            })
        } else {
            Err(format!("Error: unsupported file format '.{extension}'."))
        }
    }

    /// Condense file content through the fast-tier client. Errors bubble up
    /// so the caller can fall back to the full content.
    async fn summarize(&self, content: &str, query: &str) -> Result<String, String> {
        let client = self
            .fast_client
            .as_ref()
            .ok_or_else(|| "no fast model configured".to_string())?;

        let prompt = format!(
            "The following is the content of a file:\n\n{content}\n\n\
             Based on the request \"{query}\", extract the relevant key points \
             or summarize. Do not include unrelated content."
        );
        let turns = vec![Turn::user_text(prompt)];
        let response = client
            .generate(GenerateRequest {
                contents: &turns,
                tools: &[],
                system_instruction: None,
            })
            .await
            .map_err(|e| e.to_string())?;

        let summary = response.turn.joined_text();
        if summary.trim().is_empty() {
            return Err("summarizer returned no text".into());
        }
        Ok(format!("[Fast summary]: {}", summary.trim()))
    }

    async fn write_file(&self, file_name: &str, content: &str, append: bool) -> String {
        let mut name = file_name.to_string();
        if Path::new(&name).extension().is_none() {
            name.push_str(".txt");
        }
        // Flatten to the bare file name so writes cannot leave AI_Workspace.
        let safe_name = match Path::new(&name).file_name().and_then(|n| n.to_str()) {
            Some(n) => n.to_string(),
            None => return "Error: invalid file name.".into(),
        };

        let folder = self.base_dir.join(OUTPUT_DIR);
        if let Err(e) = tokio::fs::create_dir_all(&folder).await {
            return format!("Error: could not create output directory. {e}");
        }
        let path = folder.join(&safe_name);

        let result = if append {
            append_line(&path, content).await
        } else {
            tokio::fs::write(&path, content).await
        };
        match result {
            Ok(()) => {
                let action = if append { "appended to" } else { "saved (overwrote)" };
                format!("Success: {action} {OUTPUT_DIR}/{safe_name}")
            }
            Err(e) => {
                warn!(file = %safe_name, error = %e, "write_file failed");
                format!("Error: could not save file. {e}")
            }
        }
    }

    async fn delete_file(&self, file_name: &str) -> String {
        let path = match self.resolve(file_name) {
            Ok(p) => p,
            Err(e) => return e,
        };
        if !path.is_file() {
            return format!("Error: file '{file_name}' not found.");
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => format!("Success: deleted file {file_name}"),
            Err(e) => format!("Error: could not delete file. {e}"),
        }
    }
}

async fn append_line(path: &Path, content: &str) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.write_all(b"\n").await
}

fn build_tree(dir: &Path, depth: usize, out: &mut String) {
    if depth >= MAX_TREE_DEPTH {
        return;
    }
    let indent = " ".repeat(depth * 4);

    let mut entries: Vec<_> = match std::fs::read_dir(dir) {
        Ok(rd) => rd.filter_map(|e| e.ok()).collect(),
        Err(e) => {
            out.push_str(&format!("{indent}[error: {e}]\n"));
            return;
        }
    };
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        if path.is_dir() {
            out.push_str(&format!("{indent}[DIR]  {name}\n"));
            build_tree(&path, depth + 1, out);
        } else if let Ok(meta) = entry.metadata() {
            let modified = meta
                .modified()
                .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            out.push_str(&format!(
                "{indent}[FILE] {name:<30} | {:>8} | mod: {modified}\n",
                format_size(meta.len())
            ));
        }
    }
}

fn image_mime_type(extension: &str) -> Option<&'static str> {
    match extension {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

fn format_size(bytes: u64) -> String {
    const SUFFIXES: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut number = bytes as f64;
    let mut counter = 0;
    while number >= 1024.0 && counter < SUFFIXES.len() - 1 {
        number /= 1024.0;
        counter += 1;
    }
    format!("{:.1}{}", number, SUFFIXES[counter])
}

#[async_trait]
impl CapabilityModule for FileModule {
    fn declare_tools(&self, _tier: ModelTier) -> Vec<ToolDeclaration> {
        let read_description = if self.fast_client.is_some() {
            "Read the contents of a file. Supports text formats (.txt, .md, .csv, \
             .json, .cs, ...) and images (.png, .jpg, .jpeg, .gif, .bmp, .webp). \
             Prefix files the assistant saved with AI_Workspace/. For large files, \
             pass summary_query to extract only the relevant points."
        } else {
            "Read the contents of a file. Supports text formats (.txt, .md, .csv, \
             .json, .cs, ...) and images (.png, .jpg, .jpeg, .gif, .bmp, .webp). \
             Prefix files the assistant saved with AI_Workspace/."
        };
        let read_parameters = if self.fast_client.is_some() {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "file_name": { "type": "string", "description": "File path (e.g. AI_Workspace/notes.txt)" },
                    "summary_query": { "type": "string", "description": "Optional: extract only the points matching this query (handled by the fast model)" }
                },
                "required": ["file_name"]
            })
        } else {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "file_name": { "type": "string", "description": "File path (e.g. AI_Workspace/notes.txt)" }
                },
                "required": ["file_name"]
            })
        };

        vec![
            ToolDeclaration {
                name: "list_files".into(),
                description: "List all files and subdirectories (up to 3 levels) under the \
                              given directory path as a tree."
                    .into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "sub_path": { "type": "string", "description": "Directory path relative to the workspace root" }
                    }
                }),
            },
            ToolDeclaration {
                name: "read_file".into(),
                description: read_description.into(),
                parameters: read_parameters,
            },
            ToolDeclaration {
                name: "write_file".into(),
                description: "Save text to a file in AI_Workspace. Supports any text format \
                              (.txt, .md, .json, ...). Appends to the end of the file by \
                              default; pass append=false to overwrite."
                    .into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "file_name": { "type": "string", "description": "File name (e.g. notes.txt)" },
                        "content": { "type": "string", "description": "Content to write" },
                        "append": { "type": "boolean", "description": "true = append to the end (default); false = overwrite" }
                    },
                    "required": ["file_name", "content"]
                }),
            },
            ToolDeclaration {
                name: "delete_file".into(),
                description: "Delete a file under the workspace.".into(),
                parameters: serde_json::json!({
                    "type": "object",
                    "properties": {
                        "file_name": { "type": "string", "description": "File path to delete" }
                    },
                    "required": ["file_name"]
                }),
            },
        ]
    }

    async fn dispatch(&self, call: &ToolCall) -> Dispatch {
        let args = &call.arguments;
        match call.name.as_str() {
            "list_files" => {
                let sub_path = args["sub_path"].as_str().unwrap_or("");
                Dispatch::Handled(ToolOutput::text(self.list_files(sub_path)))
            }
            "read_file" => {
                let Some(file_name) = args["file_name"].as_str() else {
                    return Dispatch::Handled(ToolOutput::text(
                        "Error: missing 'file_name' argument.",
                    ));
                };
                let outcome = match self.read_file(file_name).await {
                    Ok(o) => o,
                    Err(e) => return Dispatch::Handled(ToolOutput::text(e)),
                };
                match outcome {
                    ReadOutcome::Text(content) => {
                        let query = args["summary_query"].as_str().unwrap_or("");
                        if self.fast_client.is_some() && !query.is_empty() {
                            match self.summarize(&content, query).await {
                                Ok(summary) => Dispatch::Handled(ToolOutput::text(summary)),
                                Err(e) => Dispatch::Handled(ToolOutput::text(format!(
                                    "[Summary failed: {e}]\n\
                                     [Warning: falling back to full content]\n{content}"
                                ))),
                            }
                        } else {
                            Dispatch::Handled(ToolOutput::text(content))
                        }
                    }
                    ReadOutcome::Image { mime_type, bytes } => {
                        Dispatch::Handled(ToolOutput::with_binary(
                            format!("[Read image file: {file_name}]"),
                            mime_type,
                            bytes,
                        ))
                    }
                }
            }
            "write_file" => {
                let Some(file_name) = args["file_name"].as_str() else {
                    return Dispatch::Handled(ToolOutput::text(
                        "Error: missing 'file_name' argument.",
                    ));
                };
                let content = args["content"].as_str().unwrap_or("");
                let append = args["append"].as_bool().unwrap_or(true);
                Dispatch::Handled(ToolOutput::text(
                    self.write_file(file_name, content, append).await,
                ))
            }
            "delete_file" => {
                let Some(file_name) = args["file_name"].as_str() else {
                    return Dispatch::Handled(ToolOutput::text(
                        "Error: missing 'file_name' argument.",
                    ));
                };
                Dispatch::Handled(ToolOutput::text(self.delete_file(file_name).await))
            }
            _ => Dispatch::NotHandled,
        }
    }
}
