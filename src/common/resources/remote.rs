use super::*;
use crate::common::error::MlmExportError;
use cached_path::{Cache, Options, ProgressBar};
use dirs::cache_dir;
use lazy_static::lazy_static;
use std::path::PathBuf;

/// # Remote resource that will be downloaded and cached locally on demand
#[derive(PartialEq, Clone, Debug)]
pub struct RemoteResource {
    /// Remote path/url for the resource
    pub url: String,
    /// Local subdirectory of the cache root where this resource is saved
    pub cache_subdir: String,
}

impl RemoteResource {
    /// Creates a new RemoteResource from an URL and a custom local path. Note that this does not
    /// download the resource (only declares the remote and local locations)
    ///
    /// # Arguments
    ///
    /// * `url` - `&str` Location of the remote resource
    /// * `cache_subdir` - `&str` Local subdirectory of the cache root to save the resource to
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mlm_export::resources::RemoteResource;
    /// let config_resource = RemoteResource::new("http://config_json_location", "configs");
    /// ```
    pub fn new(url: &str, cache_subdir: &str) -> RemoteResource {
        RemoteResource {
            url: url.to_string(),
            cache_subdir: cache_subdir.to_string(),
        }
    }

    /// Creates a new RemoteResource from a `(cache subdirectory, url)` pair, as provided by the
    /// pretrained resource constants (e.g. `BertModelResources::BERT`).
    ///
    /// # Example
    ///
    /// ```no_run
    /// use mlm_export::bert::BertModelResources;
    /// use mlm_export::resources::RemoteResource;
    /// let model_resource = RemoteResource::from_pretrained(BertModelResources::BERT);
    /// ```
    pub fn from_pretrained(name_url_tuple: (&str, &str)) -> RemoteResource {
        let cache_subdir = name_url_tuple.0.to_string();
        let url = name_url_tuple.1.to_string();
        RemoteResource { url, cache_subdir }
    }
}

impl ResourceProvider for RemoteResource {
    /// Gets the local path for a remote resource.
    ///
    /// The remote resource is downloaded and cached. Then the path
    /// to the local cache is returned.
    fn get_local_path(&self) -> Result<PathBuf, MlmExportError> {
        let cache = Cache::builder()
            .dir(CACHE_DIRECTORY.to_path_buf())
            .progress_bar(Some(ProgressBar::Light))
            .build()?;
        let cached_path = cache
            .cached_path_with_options(&self.url, &Options::default().subdir(&self.cache_subdir))?;
        log::debug!("{} cached at {}", self.url, cached_path.display());
        Ok(cached_path)
    }
}

lazy_static! {
    /// # Global cache directory
    /// If the environment variable `MLM_EXPORT_CACHE` is set, will save the cache model files at
    /// that location. Otherwise defaults to `$XDG_CACHE_HOME/.mlm-export`, or corresponding user
    /// cache for the current system.
    pub static ref CACHE_DIRECTORY: PathBuf = get_cache_directory();
}

fn get_cache_directory() -> PathBuf {
    match std::env::var_os("MLM_EXPORT_CACHE") {
        Some(value) => PathBuf::from(value),
        None => {
            let mut home = cache_dir().unwrap_or_else(std::env::temp_dir);
            home.push(".mlm-export");
            home
        }
    }
}
