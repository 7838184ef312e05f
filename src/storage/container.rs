use std::fmt;
use url::Url;

use crate::error::{MediaFlowError, Result};

/// Container-scoped SAS URL, as handed out by the media account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerUrl {
    url: Url,
}

impl ContainerUrl {
    pub fn parse(value: &str) -> Result<Self> {
        let url = Url::parse(value)?;
        if url.cannot_be_a_base() || url.path_segments().map_or(true, |mut s| s.all(str::is_empty)) {
            return Err(MediaFlowError::Storage(format!(
                "'{}' does not name a blob container",
                redact(&url)
            )));
        }
        Ok(Self { url })
    }

    /// URL of a blob inside the container, keeping the SAS query
    ///
    /// `/` in `name` becomes a virtual directory separator.
    pub fn blob_url(&self, name: &str) -> Url {
        let mut url = self.url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            segments.extend(name.split('/'));
        }
        url
    }

    /// URL of the List Blobs operation, continuing from `marker` when given
    pub fn list_url(&self, marker: Option<&str>) -> Url {
        let mut url = self.url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("restype", "container");
            query.append_pair("comp", "list");
            if let Some(marker) = marker {
                query.append_pair("marker", marker);
            }
        }
        url
    }
}

/// URL without its query string, safe to log
pub fn redact(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.to_string()
}

impl fmt::Display for ContainerUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&redact(&self.url))
    }
}
