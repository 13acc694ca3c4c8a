use crate::domain::{config::ChatConfig, error::{ChatError, ChatResult}};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = ".chatrelay";
const CONFIG_FILE: &str = "config.toml";

/// Configuration manager
///
/// Resolution order: defaults, then the global file, then the nearest
/// project file. An explicit path bypasses both files.
pub struct ConfigManager {
    global_config_path: Option<PathBuf>,
    project_config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> Self {
        Self {
            global_config_path: Self::get_global_config_path(),
            project_config_path: Self::find_project_config_path(),
        }
    }

    /// Build a manager over explicit locations
    pub fn with_paths(global: Option<PathBuf>, project: Option<PathBuf>) -> Self {
        Self {
            global_config_path: global,
            project_config_path: project,
        }
    }

    /// Load configuration from files
    pub fn load_config(&self) -> ChatResult<ChatConfig> {
        let mut config = ChatConfig::default();

        if let Some(global_path) = &self.global_config_path {
            if global_path.exists() {
                config = self.load_config_from_path(global_path)?;
            }
        }

        // Project file wins over the global file section by section
        if let Some(project_path) = &self.project_config_path {
            if project_path.exists() {
                let content = Self::read(project_path)?;
                let project = Self::parse(project_path, &content)?;
                let table: toml::Table = toml::from_str(&content).map_err(|e| ChatError::Config {
                    message: format!("Failed to parse config file {}: {}", project_path.display(), e),
                })?;
                if table.contains_key("global") {
                    config.global = project.global;
                }
                if table.contains_key("server") {
                    config.server = project.server;
                }
                if table.contains_key("client") {
                    config.client = project.client;
                }
            }
        }

        Ok(config)
    }

    /// Get global configuration path
    fn get_global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("chatrelay").join(CONFIG_FILE))
    }

    /// Find project configuration path by walking up directory tree
    fn find_project_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        Self::find_project_config_from(&current_dir)
    }

    fn find_project_config_from(start: &Path) -> Option<PathBuf> {
        let mut path = start;

        loop {
            let config_path = path.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            path = path.parent()?;
        }
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> ChatResult<ChatConfig> {
        let content = Self::read(path)?;
        Self::parse(path, &content)
    }

    /// Save configuration to specific path
    pub fn save_config_to_path(&self, path: &Path, config: &ChatConfig) -> ChatResult<()> {
        let content = toml::to_string_pretty(config).map_err(|e| ChatError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| ChatError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }

    /// Create default project configuration under `path`
    pub fn init_project_config(&self, path: &Path) -> ChatResult<PathBuf> {
        let config_dir = path.join(CONFIG_DIR);
        let config_file = config_dir.join(CONFIG_FILE);

        if config_file.exists() {
            return Err(ChatError::Config {
                message: "Project configuration already exists".to_string(),
            });
        }

        fs::create_dir_all(&config_dir).map_err(|e| ChatError::Config {
            message: format!("Failed to create {} directory: {}", CONFIG_DIR, e),
        })?;

        self.save_config_to_path(&config_file, &ChatConfig::default())?;
        Ok(config_file)
    }

    /// Get the current project config path (if any)
    pub fn get_project_config_path(&self) -> Option<&PathBuf> {
        self.project_config_path.as_ref()
    }

    /// Get the global config path (if a home directory is known)
    pub fn get_global_config_path_ref(&self) -> Option<&PathBuf> {
        self.global_config_path.as_ref()
    }

    fn read(path: &Path) -> ChatResult<String> {
        fs::read_to_string(path).map_err(|e| ChatError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })
    }

    fn parse(path: &Path, content: &str) -> ChatResult<ChatConfig> {
        toml::from_str(content).map_err(|e| ChatError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
