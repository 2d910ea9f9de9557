//! Configuration module

use std::env;
use std::path::PathBuf;

use recurrence_engine::{ArtifactPaths, DEFAULT_BACKGROUND_LIMIT};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Server port
    pub port: u16,

    /// Serialized tree ensemble
    pub model_path: PathBuf,

    /// Tuned decision threshold (plain text)
    pub threshold_path: PathBuf,

    /// Reference population CSV
    pub reference_data_path: PathBuf,

    /// Max background rows for local explanations
    pub background_limit: usize,

    /// Environment (development, production)
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://patients.db".to_string(),
            port: 5050,
            model_path: PathBuf::from("final_model.json"),
            threshold_path: PathBuf::from("best_threshold.txt"),
            reference_data_path: PathBuf::from("X_train_shap.csv"),
            background_limit: DEFAULT_BACKGROUND_LIMIT,
            environment: "development".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or(defaults.database_url),

            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),

            model_path: env::var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),

            threshold_path: env::var("THRESHOLD_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.threshold_path),

            reference_data_path: env::var("REFERENCE_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.reference_data_path),

            background_limit: env::var("BACKGROUND_LIMIT")
                .ok()
                .and_then(|n| n.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.background_limit),

            environment: env::var("ENVIRONMENT")
                .unwrap_or(defaults.environment),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            model: self.model_path.clone(),
            threshold: self.threshold_path.clone(),
            reference_data: self.reference_data_path.clone(),
        }
    }
}
