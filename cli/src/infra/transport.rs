//! `ImageTransport` over the endpoint's datastore folder HTTP service.
//!
//! Images are plain files in a local image directory; `<image_ref>` there is
//! PUT to `/folder/<path>?dcPath=<dc>&dsName=<ds>` and exports are GET from
//! the same URL scheme. Both directions stream; disk images do not fit in
//! memory.

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use futures_util::TryStreamExt as _;
use tokio::io::{AsyncRead, AsyncWriteExt as _};
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, info, warn};

use crate::application::ports::{DatastoreFile, ImageTransport};
use crate::domain::VmopsError;

/// Moves image files between a local directory and datastores.
pub struct HttpImageTransport {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    image_dir: Option<PathBuf>,
}

impl HttpImageTransport {
    /// # Errors
    ///
    /// Returns [`VmopsError::Transfer`] when the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        username: &str,
        password: &str,
        image_dir: Option<PathBuf>,
    ) -> Result<Self, VmopsError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| VmopsError::Transfer(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            image_dir,
        })
    }

    fn local_path(&self, image: &str) -> Result<PathBuf, VmopsError> {
        let dir = self
            .image_dir
            .as_deref()
            .ok_or_else(|| VmopsError::Transfer("provisioning.image_dir is not set".to_string()))?;
        // Image names are single path components.
        let mut components = Path::new(image).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(VmopsError::Transfer(format!("invalid image name: {image}")));
        }
        Ok(dir.join(image))
    }

    fn url(&self, file: &DatastoreFile) -> Result<reqwest::Url, VmopsError> {
        folder_url(&self.base_url, file)
    }
}

/// `/folder/<path>` URL with the datacenter and datastore as query.
fn folder_url(base_url: &str, file: &DatastoreFile) -> Result<reqwest::Url, VmopsError> {
    let mut url =
        reqwest::Url::parse(base_url).map_err(|e| VmopsError::Transfer(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| VmopsError::Transfer(format!("{base_url} cannot be a base URL")))?
        .pop_if_empty()
        .push("folder")
        .extend(file.path.path.split('/').filter(|s| !s.is_empty()));
    url.query_pairs_mut()
        .append_pair("dcPath", &file.datacenter)
        .append_pair("dsName", &file.path.datastore);
    Ok(url)
}

fn transfer(context: &str, e: impl std::fmt::Display) -> VmopsError {
    VmopsError::Transfer(format!("{context}: {e}"))
}

/// `<dest>.part`, the staging name used while a download is in flight.
fn part_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

/// Copy `body` into `<dest>.part` and rename it to `dest` once complete.
/// On failure the partial file is removed and an existing `dest` is left
/// untouched.
async fn save_atomically<R>(dest: &Path, mut body: R) -> Result<u64, VmopsError>
where
    R: AsyncRead + Unpin,
{
    let part = part_path(dest);
    let result = async {
        let mut file = tokio::fs::File::create(&part)
            .await
            .map_err(|e| transfer(&format!("cannot create {}", part.display()), e))?;
        let written = tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|e| transfer(&format!("cannot save {}", dest.display()), e))?;
        file.flush()
            .await
            .map_err(|e| transfer(&format!("cannot write {}", part.display()), e))?;
        drop(file);
        tokio::fs::rename(&part, dest)
            .await
            .map_err(|e| transfer(&format!("cannot move {} into place", part.display()), e))?;
        Ok(written)
    }
    .await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&part).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %part.display(), error = %e, "cannot remove partial download");
            }
        }
    }
    result
}

impl ImageTransport for HttpImageTransport {
    async fn fetch_image(&self, image_ref: &str, dest: &DatastoreFile) -> Result<(), VmopsError> {
        let source = self.local_path(image_ref)?;
        let file = tokio::fs::File::open(&source)
            .await
            .map_err(|e| transfer(&format!("cannot read {}", source.display()), e))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| transfer(&format!("cannot read {}", source.display()), e))?
            .len();
        let response = self
            .client
            .put(self.url(dest)?)
            .basic_auth(&self.username, Some(&self.password))
            .header(reqwest::header::CONTENT_LENGTH, size)
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(|e| transfer("upload to datastore", e))?;
        if !response.status().is_success() {
            return Err(VmopsError::Transfer(format!(
                "upload of {image_ref} to {} answered {}",
                dest.path,
                response.status()
            )));
        }
        info!(image = image_ref, dest = %dest.path, bytes = size, "image copied to datastore");
        Ok(())
    }

    async fn upload_image(
        &self,
        image_name: &str,
        source: &DatastoreFile,
    ) -> Result<(), VmopsError> {
        let dest = self.local_path(image_name)?;
        let response = self
            .client
            .get(self.url(source)?)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| transfer("download from datastore", e))?;
        if !response.status().is_success() {
            return Err(VmopsError::Transfer(format!(
                "download of {} answered {}",
                source.path,
                response.status()
            )));
        }
        let body = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));
        let written = save_atomically(&dest, body).await?;
        debug!(bytes = written, "download complete");
        info!(image = image_name, source = %source.path, "image exported");
        Ok(())
    }
}
