// src/services/secure_config.rs
//! Encrypted on-disk storage for the agent configuration written by setup.
//!
//! The config file holds `base64(nonce || AES-256-GCM ciphertext)` of the
//! JSON-encoded [`AgentSettings`]. The 32-byte master key lives in its own
//! file, base64 encoded, and is created the first time something is saved.

use crate::errors::AppError;
use crate::models::{AgentSettings, LlmProvider, SetupRequest};
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;
use std::fs;
use std::path::{Path, PathBuf};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

pub struct SecureConfigStore {
    config_file: PathBuf,
    master_key_file: PathBuf,
}

impl SecureConfigStore {
    pub fn new(config_file: impl Into<PathBuf>, master_key_file: impl Into<PathBuf>) -> Self {
        Self {
            config_file: config_file.into(),
            master_key_file: master_key_file.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config_file.exists() && self.master_key_file.exists()
    }

    pub fn save(&self, settings: &AgentSettings) -> Result<(), AppError> {
        let key = self.get_or_create_master_key()?;
        let plaintext = serde_json::to_vec_pretty(settings)?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| AppError::Config(format!("Invalid master key: {}", e)))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| AppError::Config("Encryption failed".to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);

        write_private(&self.config_file, general_purpose::STANDARD.encode(sealed).as_bytes())
    }

    pub fn load(&self) -> Result<Option<AgentSettings>, AppError> {
        if !self.is_configured() {
            return Ok(None);
        }
        self.decrypt()
            .map(Some)
            .map_err(|e| AppError::Config(format!("Failed to load configuration: {}", e)))
    }

    pub fn delete(&self) -> Result<(), AppError> {
        for path in [&self.config_file, &self.master_key_file] {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn decrypt(&self) -> Result<AgentSettings, String> {
        let key = self.read_master_key().map_err(|e| e.to_string())?;
        let encoded = fs::read_to_string(&self.config_file).map_err(|e| e.to_string())?;
        let sealed = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| e.to_string())?;
        if sealed.len() <= NONCE_LEN {
            return Err("config file is truncated".to_string());
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|e| e.to_string())?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| "decryption failed (wrong key or corrupted data)".to_string())?;

        serde_json::from_slice(&plaintext).map_err(|e| e.to_string())
    }

    fn read_master_key(&self) -> Result<[u8; KEY_LEN], AppError> {
        let encoded = fs::read_to_string(&self.master_key_file)?;
        let raw = general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| AppError::Config(format!("Master key is not valid base64: {}", e)))?;
        raw.try_into()
            .map_err(|_| AppError::Config("Master key has the wrong length".to_string()))
    }

    fn get_or_create_master_key(&self) -> Result<[u8; KEY_LEN], AppError> {
        if self.master_key_file.exists() {
            return self.read_master_key();
        }
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        write_private(
            &self.master_key_file,
            general_purpose::STANDARD.encode(key).as_bytes(),
        )?;
        Ok(key)
    }
}

/// Writes the file readable by the owner only.
fn write_private(path: &Path, contents: &[u8]) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Checks the setup form and turns it into settings, reporting the first
/// problem found.
pub fn validate_setup(data: &SetupRequest) -> Result<AgentSettings, AppError> {
    let invalid = |msg: &str| Err(AppError::Validation(msg.to_string()));

    let Some(provider) = present(&data.llm_provider) else {
        return invalid("LLM provider is required");
    };
    let groq_key = present(&data.groq_api_key);
    let openai_key = present(&data.openai_api_key);

    if provider == "groq" && groq_key.is_none() {
        return invalid("Groq API key is required when using Groq");
    }
    if provider == "openai" && openai_key.is_none() {
        return invalid("OpenAI API key is required when using OpenAI");
    }
    let Some(openai_key) = openai_key else {
        return invalid("OpenAI API key is required for embeddings");
    };
    if !openai_key.starts_with("sk-") {
        return invalid("OpenAI API key format appears invalid (should start with 'sk-')");
    }
    if groq_key.is_some_and(|k| !k.starts_with("gsk_")) {
        return invalid("Groq API key format appears invalid (should start with 'gsk_')");
    }

    let llm_provider = match provider {
        "groq" => LlmProvider::Groq,
        "openai" => LlmProvider::OpenAi,
        other => {
            return Err(AppError::Validation(format!(
                "Unsupported LLM provider: {}",
                other
            )));
        }
    };

    Ok(AgentSettings {
        llm_provider,
        llm_model: present(&data.llm_model)
            .unwrap_or(AgentSettings::DEFAULT_MODEL)
            .to_string(),
        groq_api_key: groq_key.map(str::to_string),
        openai_api_key: openai_key.to_string(),
        openai_llm_api_key: present(&data.openai_llm_api_key).map(str::to_string),
        enable_vision: data.enable_vision.unwrap_or(true),
        enable_memory: data.enable_memory.unwrap_or(true),
        memory_max_turns: data
            .memory_max_turns
            .unwrap_or(AgentSettings::DEFAULT_MAX_TURNS),
        faiss_index_path: present(&data.faiss_index_path).map(str::to_string),
    })
}
