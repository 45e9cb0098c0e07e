use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chat_core::llm::Message;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

/// Last selections, kept under the same key names the web client used in
/// its local storage.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedState {
    pub last_provider: Option<String>,
    pub last_model: Option<String>,
}

pub fn state_path() -> Option<PathBuf> {
    let base = BaseDirs::new()?;
    Some(base.config_dir().join("minichat").join("state.json"))
}

pub fn history_path() -> Option<PathBuf> {
    let base = BaseDirs::new()?;
    Some(base.data_dir().join("minichat").join("chat_history.json"))
}

pub fn load_state() -> SavedState {
    state_path().map(|p| load_state_from(&p)).unwrap_or_default()
}

pub fn save_state(state: &SavedState) -> Result<()> {
    let Some(path) = state_path() else {
        return Ok(());
    };
    write_atomic(&path, &serde_json::to_vec_pretty(state)?)
}

/// Conversation history. A corrupted cache is discarded and treated as
/// empty, never raised.
pub fn load_history() -> Vec<Message> {
    history_path().map(|p| load_history_from(&p)).unwrap_or_default()
}

pub fn save_history(msgs: &[Message]) -> Result<()> {
    let Some(path) = history_path() else {
        return Ok(());
    };
    write_atomic(&path, &serde_json::to_vec_pretty(msgs)?)
}

fn load_state_from(path: &Path) -> SavedState {
    let Ok(data) = fs::read(path) else {
        return SavedState::default();
    };
    serde_json::from_slice(&data).unwrap_or_default()
}

fn load_history_from(path: &Path) -> Vec<Message> {
    let Ok(data) = fs::read(path) else {
        return Vec::new();
    };
    serde_json::from_slice(&data).unwrap_or_default()
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let mut tmp = path.to_path_buf();
    tmp.set_extension("json.tmp");
    {
        let mut f =
            fs::File::create(&tmp).with_context(|| format!("create tmp: {}", tmp.display()))?;
        f.write_all(data)?;
        f.flush()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("persist to {}", path.display()))?;
    Ok(())
}
