//! Run configuration (§6): the `config` argument to [`crate::evaluatorq`],
//! plus the ambient defaults-file and environment-variable plumbing used to
//! resolve remote-platform credentials.

use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::data::DataSource;
use crate::registry::{EvaluatorRegistry, JobRegistry};

const DEFAULT_BASE_URL: &str = "https://my.orq.ai";
const DEFAULTS_FILE_NAME: &str = ".evaluatorq_defaults.toml";

/// The full set of run options (§6 "Entry point" options table).
pub struct EvaluatorqConfig {
    pub data: DataSource,
    pub jobs: JobRegistry,
    pub evaluators: EvaluatorRegistry,
    /// Default 1, per §4.4.
    pub parallelism: usize,
    /// Render a progress bar to stderr as datapoints complete.
    pub show_progress: bool,
    /// Render and return a table via the Presenter.
    pub print: bool,
    /// Upload the run to the remote platform via the Uploader.
    pub send_results: bool,
    pub description: Option<String>,
    /// Slash-delimited project/folder path (e.g. `"Project/Folder/Subfolder"`)
    /// stored on the uploaded record; mapped by the remote platform to a
    /// project + folder location.
    pub path: Option<String>,
    /// Ambient CLI convenience, unrelated to `path` above: also write the
    /// result tree locally as JSON Lines at this path.
    pub jsonl_path: Option<String>,
    /// Collaborators needed only if `data` is a dataset descriptor or
    /// `send_results` is set; absent otherwise.
    pub clients: Clients,
}

impl EvaluatorqConfig {
    pub fn new(data: DataSource, jobs: JobRegistry, evaluators: EvaluatorRegistry) -> Self {
        Self {
            data,
            jobs,
            evaluators,
            parallelism: 1,
            show_progress: false,
            print: true,
            send_results: false,
            description: None,
            path: None,
            jsonl_path: None,
            clients: Clients::none(),
        }
    }
}

/// Contents of `~/.evaluatorq_defaults.toml`, all fields optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefaultsFile {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub parallelism: Option<usize>,
}

/// Loads `~/.evaluatorq_defaults.toml` if present; a missing or unparsable
/// file is treated as an empty default set, logged at warn level for the
/// latter.
pub fn load_defaults_file() -> DefaultsFile {
    let Some(home) = dirs::home_dir() else {
        return DefaultsFile::default();
    };
    let path = home.join(DEFAULTS_FILE_NAME);
    match std::fs::read_to_string(&path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_else(|error| {
            warn!(%error, path = %path.display(), "ignoring malformed defaults file");
            DefaultsFile::default()
        }),
        Err(_) => DefaultsFile::default(),
    }
}

fn default_base_url() -> Url {
    match Url::parse(DEFAULT_BASE_URL) {
        Ok(url) => url,
        Err(_) => unreachable!("DEFAULT_BASE_URL is a valid URL constant"),
    }
}

/// Resolved remote-platform credentials, in precedence order: environment
/// variables, then `~/.evaluatorq_defaults.toml`, then the built-in default
/// base URL. `ORQ_API_KEY` has no built-in default - without it, uploads
/// are simply not configured.
pub struct RemotePlatformSettings {
    pub api_key: Option<String>,
    pub base_url: Url,
}

pub fn resolve_remote_platform_settings(defaults: &DefaultsFile) -> RemotePlatformSettings {
    resolve_remote_platform_settings_from(
        std::env::var("ORQ_API_KEY").ok(),
        std::env::var("ORQ_BASE_URL").ok(),
        defaults,
    )
}

/// Env-lookup-injected core of [`resolve_remote_platform_settings`], split out
/// so precedence can be unit-tested without mutating process-global state.
fn resolve_remote_platform_settings_from(
    env_api_key: Option<String>,
    env_base_url: Option<String>,
    defaults: &DefaultsFile,
) -> RemotePlatformSettings {
    let api_key = env_api_key.or_else(|| defaults.api_key.clone());

    let base_url = env_base_url
        .and_then(|raw| Url::parse(&raw).ok())
        .or_else(|| defaults.base_url.as_deref().and_then(|raw| Url::parse(raw).ok()))
        .unwrap_or_else(default_base_url);

    RemotePlatformSettings { api_key, base_url }
}

/// Lazily-initialized collaborators shared across a run (ambient, §2 item 12).
pub struct Clients {
    pub dataset_registry: Option<Arc<dyn crate::data::DatasetRegistryClient>>,
    pub remote_platform: Option<Arc<dyn crate::upload::RemotePlatformClient>>,
}

impl Clients {
    pub fn none() -> Self {
        Self {
            dataset_registry: None,
            remote_platform: None,
        }
    }
}
