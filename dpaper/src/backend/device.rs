//! Remote Content Service over the reader's REST API.
//!
//! The device keeps all user content under one well-known folder
//! (`Document`); paths handed to this client are relative to it and the
//! prefix never leaks out. Entries are addressed by opaque ids, so every
//! path-based call first walks the path's components through folder
//! listings.
//!
//! Registration and session establishment happen out of band; the client is
//! handed a base URL it can talk to directly.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use reqwest::StatusCode;
use tokio::io;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    transport_error, Error, NodeKind, RemoteContentService, RemoteNode, Result,
};

const CONTENT_ROOT: &str = "Document";

mod api {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Deserialize)]
    pub struct EntryList {
        pub entry_list: Vec<Entry>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Entry {
        pub entry_id: String,
        pub entry_name: String,
        pub entry_type: EntryType,
        #[serde(default)]
        pub file_size: Option<String>,
        #[serde(default)]
        pub modified_date: Option<String>,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum EntryType {
        Document,
        Folder,
    }

    #[derive(Debug, Serialize)]
    pub struct NewFolder<'a> {
        pub folder_name: &'a str,
        pub parent_folder_id: &'a str,
    }

    #[derive(Debug, Serialize)]
    pub struct NewDocument<'a> {
        pub file_name: &'a str,
        pub parent_folder_id: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub modified_date: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct NewDocumentReply {
        pub document_id: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ConfigValue {
        pub value: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct TemplateList {
        pub template_list: Vec<TemplateEntry>,
    }

    #[derive(Debug, Deserialize)]
    pub struct TemplateEntry {
        pub note_template_id: String,
        pub template_name: String,
    }

    #[derive(Debug, Serialize)]
    pub struct NewTemplate<'a> {
        pub template_name: &'a str,
    }

    #[derive(Debug, Deserialize)]
    pub struct NewTemplateReply {
        pub note_template_id: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct AccessPointList {
        pub aplist: Vec<AccessPointEntry>,
    }

    #[derive(Debug, Deserialize)]
    pub struct AccessPointEntry {
        pub ssid: String,
        pub security: String,
    }

    #[derive(Debug, Serialize)]
    pub struct NewAccessPoint<'a> {
        pub ssid: &'a str,
        pub security: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub passwd: Option<&'a str>,
        pub dhcp: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub static_address: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub gateway: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub network_mask: Option<u8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub dns1: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub dns2: Option<&'a str>,
        pub proxy: bool,
    }

    #[derive(Debug, Deserialize)]
    pub struct StorageStatus {
        pub capacity: String,
        pub available: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct BatteryStatus {
        pub level: String,
        pub plugged: String,
        pub health: String,
    }
}

#[derive(Debug, Clone)]
pub struct DeviceClient {
    client: reqwest::Client,
    base: Url,
    root_id: std::sync::Arc<OnceCell<String>>,
}

impl DeviceClient {
    /// Builds a client for the device at `base`. The device serves a
    /// self-signed certificate, so verification is off for this client.
    pub fn new(base: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|err| transport_error!("building HTTP client: {err}"))?;
        Ok(Self {
            client,
            base,
            root_id: std::sync::Arc::new(OnceCell::new()),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|err| transport_error!("bad endpoint {path}: {err}"))
    }

    async fn send(
        &self,
        req: reqwest::RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response> {
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            resp = req.send() => resp.map_err(|err| transport_error!("{err}")),
        }
    }

    async fn root_id(&self, cancel: &CancellationToken) -> Result<String> {
        let id = self
            .root_id
            .get_or_try_init(|| async {
                let url = self.url(&format!("resolve/entry/path/{CONTENT_ROOT}"))?;
                let resp = self.send(self.client.get(url), cancel).await?;
                let resp = check_status(resp, Utf8Path::new("")).await?;
                let entry: api::Entry = decode(resp).await?;
                Ok::<_, Error>(entry.entry_id)
            })
            .await?;
        Ok(id.clone())
    }

    async fn entries_of(
        &self,
        folder_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<api::Entry>> {
        let url = self.url(&format!("folders/{folder_id}/entries2"))?;
        let resp = self.send(self.client.get(url), cancel).await?;
        let resp = check_status(resp, Utf8Path::new("")).await?;
        let list: api::EntryList = decode(resp).await?;
        Ok(list.entry_list)
    }

    /// Walks `path` component by component through listings. `Ok(None)`
    /// means some component is absent or sits under a document.
    async fn node_at(
        &self,
        path: &Utf8Path,
        cancel: &CancellationToken,
    ) -> Result<Option<RemoteNode>> {
        let mut current = RemoteNode::new(
            self.root_id(cancel).await?,
            Utf8PathBuf::new(),
            NodeKind::Folder,
        );
        for component in path.components() {
            if !current.is_folder() {
                return Ok(None);
            }
            let entries = self.entries_of(current.id(), cancel).await?;
            let name = component.as_str();
            match entries.into_iter().find(|entry| entry.entry_name == name) {
                Some(entry) => {
                    let node_path = current.path().join(name);
                    current = into_node(entry, node_path)?;
                }
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    async fn folder_at(&self, path: &Utf8Path, cancel: &CancellationToken) -> Result<RemoteNode> {
        match self.node_at(path, cancel).await? {
            Some(node) if node.is_folder() => Ok(node),
            _ => Err(Error::NotFound(path.to_owned())),
        }
    }

    pub async fn get_setting(
        &self,
        key: crate::device::SettingKey,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let url = self.url(&format!("system/configs/{}", key.api_name()))?;
        let resp = self.send(self.client.get(url), cancel).await?;
        let resp = check_status(resp, Utf8Path::new("")).await?;
        let value: api::ConfigValue = decode(resp).await?;
        Ok(value.value)
    }

    pub async fn set_setting(
        &self,
        key: crate::device::SettingKey,
        value: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        key.validate(value)?;
        log::info!("setting {key} to '{value}'");
        let url = self.url(&format!("system/configs/{}", key.api_name()))?;
        let body = api::ConfigValue {
            value: value.to_string(),
        };
        let resp = self.send(self.client.put(url).json(&body), cancel).await?;
        check_status(resp, Utf8Path::new("")).await?;
        Ok(())
    }

    pub async fn storage(&self, cancel: &CancellationToken) -> Result<crate::device::StorageInfo> {
        let url = self.url("system/status/storage")?;
        let resp = self.send(self.client.get(url), cancel).await?;
        let resp = check_status(resp, Utf8Path::new("")).await?;
        let status: api::StorageStatus = decode(resp).await?;
        Ok(crate::device::StorageInfo {
            capacity: parse_num(&status.capacity, "capacity")?,
            available: parse_num(&status.available, "available")?,
        })
    }

    pub async fn firmware_version(&self, cancel: &CancellationToken) -> Result<String> {
        let url = self.url("system/status/firmware_version")?;
        let resp = self.send(self.client.get(url), cancel).await?;
        let resp = check_status(resp, Utf8Path::new("")).await?;
        let value: api::ConfigValue = decode(resp).await?;
        Ok(value.value)
    }

    pub async fn mac_address(&self, cancel: &CancellationToken) -> Result<String> {
        let url = self.url("system/status/mac_address")?;
        let resp = self.send(self.client.get(url), cancel).await?;
        let resp = check_status(resp, Utf8Path::new("")).await?;
        let value: api::ConfigValue = decode(resp).await?;
        Ok(value.value)
    }

    /// Note templates installed on the device, in listing order.
    pub async fn list_templates(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<crate::device::TemplateInfo>> {
        log::trace!("listing note templates");
        let url = self.url("viewer/configs/note_templates")?;
        let resp = self.send(self.client.get(url), cancel).await?;
        let resp = check_status(resp, Utf8Path::new("")).await?;
        let list: api::TemplateList = decode(resp).await?;
        Ok(list
            .template_list
            .into_iter()
            .map(|entry| crate::device::TemplateInfo {
                id: entry.note_template_id,
                name: entry.template_name,
            })
            .collect())
    }

    async fn template_named(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<crate::device::TemplateInfo> {
        self.list_templates(cancel)
            .await?
            .into_iter()
            .find(|template| template.name == name)
            .ok_or_else(|| Error::NotFound(Utf8PathBuf::from(name)))
    }

    /// Registers a template named `name` with the PDF content read from
    /// `data`. Template names are unique on the device.
    pub async fn add_template(
        &self,
        name: &str,
        data: impl io::AsyncRead + Send + Unpin,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let existing = self.list_templates(cancel).await?;
        if existing.iter().any(|template| template.name == name) {
            return Err(Error::AlreadyExists(Utf8PathBuf::from(name)));
        }
        log::info!("adding note template '{name}'");

        let mut data = data;
        let mut content = Vec::new();
        io::AsyncReadExt::read_to_end(&mut data, &mut content).await?;

        let url = self.url("viewer/configs/note_templates")?;
        let body = api::NewTemplate {
            template_name: name,
        };
        let resp = self.send(self.client.post(url).json(&body), cancel).await?;
        let resp = check_status(resp, Utf8Path::new(name)).await?;
        let reply: api::NewTemplateReply = decode(resp).await?;

        let url = self.url(&format!(
            "viewer/configs/note_templates/{}/file",
            reply.note_template_id
        ))?;
        let part = reqwest::multipart::Part::bytes(content).file_name(format!("{name}.pdf"));
        let form = reqwest::multipart::Form::new().part("file", part);
        let resp = self
            .send(self.client.put(url).multipart(form), cancel)
            .await?;
        check_status(resp, Utf8Path::new(name)).await?;
        Ok(())
    }

    pub async fn rename_template(
        &self,
        name: &str,
        new_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let existing = self.list_templates(cancel).await?;
        if existing.iter().any(|template| template.name == new_name) {
            return Err(Error::AlreadyExists(Utf8PathBuf::from(new_name)));
        }
        let template = existing
            .into_iter()
            .find(|template| template.name == name)
            .ok_or_else(|| Error::NotFound(Utf8PathBuf::from(name)))?;
        log::info!("renaming note template '{name}' to '{new_name}'");
        let url = self.url(&format!("viewer/configs/note_templates/{}", template.id))?;
        let body = api::NewTemplate {
            template_name: new_name,
        };
        let resp = self.send(self.client.put(url).json(&body), cancel).await?;
        check_status(resp, Utf8Path::new(name)).await?;
        Ok(())
    }

    pub async fn delete_template(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        let template = self.template_named(name, cancel).await?;
        log::info!("deleting note template '{name}'");
        let url = self.url(&format!("viewer/configs/note_templates/{}", template.id))?;
        let resp = self.send(self.client.delete(url), cancel).await?;
        check_status(resp, Utf8Path::new(name)).await?;
        Ok(())
    }

    /// Wifi networks registered on the device.
    pub async fn wifi_networks(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<crate::device::AccessPoint>> {
        let url = self.url("system/configs/wifi_accesspoints")?;
        let resp = self.send(self.client.get(url), cancel).await?;
        let resp = check_status(resp, Utf8Path::new("")).await?;
        let list: api::AccessPointList = decode(resp).await?;
        list.aplist.into_iter().map(into_access_point).collect()
    }

    /// Asks the device to scan for visible networks and reports what it saw.
    pub async fn scan_wifi(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<crate::device::AccessPoint>> {
        log::trace!("scanning for wifi networks");
        let url = self.url("system/controls/wifi_accesspoints/scan")?;
        let resp = self.send(self.client.post(url), cancel).await?;
        let resp = check_status(resp, Utf8Path::new("")).await?;
        let list: api::AccessPointList = decode(resp).await?;
        list.aplist.into_iter().map(into_access_point).collect()
    }

    pub async fn add_wifi_network(
        &self,
        network: &crate::device::WifiNetworkConfig,
        cancel: &CancellationToken,
    ) -> Result<()> {
        network.validate()?;
        log::info!("registering wifi network '{}'", network.ssid);
        let url = self.url("system/configs/wifi_accesspoints")?;
        let body = api::NewAccessPoint {
            ssid: &network.ssid,
            security: network.security.api_name(),
            passwd: network.password.as_deref(),
            dhcp: network.dhcp,
            static_address: network.static_address.as_deref(),
            gateway: network.gateway.as_deref(),
            network_mask: network.network_mask,
            dns1: network.dns1.as_deref(),
            dns2: network.dns2.as_deref(),
            proxy: network.proxy,
        };
        let resp = self.send(self.client.put(url).json(&body), cancel).await?;
        check_status(resp, Utf8Path::new(network.ssid.as_str())).await?;
        Ok(())
    }

    pub async fn delete_wifi_network(
        &self,
        ssid: &str,
        security: crate::device::WifiSecurity,
        cancel: &CancellationToken,
    ) -> Result<()> {
        log::info!("deleting wifi network '{ssid}'");
        let url = self.url(&format!(
            "system/configs/wifi_accesspoints/{}/{ssid}",
            security.api_name()
        ))?;
        let resp = self.send(self.client.delete(url), cancel).await?;
        check_status(resp, Utf8Path::new(ssid)).await?;
        Ok(())
    }

    pub async fn wifi_enabled(&self, cancel: &CancellationToken) -> Result<bool> {
        let url = self.url("system/configs/wifi")?;
        let resp = self.send(self.client.get(url), cancel).await?;
        let resp = check_status(resp, Utf8Path::new("")).await?;
        let value: api::ConfigValue = decode(resp).await?;
        Ok(value.value == "on")
    }

    pub async fn set_wifi_enabled(&self, enabled: bool, cancel: &CancellationToken) -> Result<()> {
        let value = if enabled { "on" } else { "off" };
        log::info!("turning wifi {value}");
        let url = self.url("system/configs/wifi")?;
        let body = api::ConfigValue {
            value: value.to_string(),
        };
        let resp = self.send(self.client.put(url).json(&body), cancel).await?;
        check_status(resp, Utf8Path::new("")).await?;
        Ok(())
    }

    pub async fn battery(&self, cancel: &CancellationToken) -> Result<crate::device::BatteryInfo> {
        let url = self.url("system/status/battery")?;
        let resp = self.send(self.client.get(url), cancel).await?;
        let resp = check_status(resp, Utf8Path::new("")).await?;
        let status: api::BatteryStatus = decode(resp).await?;
        Ok(crate::device::BatteryInfo {
            level: parse_num(&status.level, "level")? as u32,
            plugged: status.plugged == "true",
            health: status.health,
        })
    }
}

impl RemoteContentService for DeviceClient {
    async fn list_children(
        &self,
        folder: &Utf8Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteNode>> {
        log::trace!("listing '{folder}'");
        let node = self.folder_at(folder, cancel).await?;
        let entries = self.entries_of(node.id(), cancel).await?;
        entries
            .into_iter()
            .map(|entry| {
                let path = folder.join(&entry.entry_name);
                into_node(entry, path)
            })
            .collect()
    }

    async fn create_folder(
        &self,
        path: &Utf8Path,
        cancel: &CancellationToken,
    ) -> Result<RemoteNode> {
        let parent_path = path.parent().unwrap_or(Utf8Path::new(""));
        let name = path
            .file_name()
            .ok_or_else(|| Error::NotFound(path.to_owned()))?;
        let parent = self
            .node_at(parent_path, cancel)
            .await?
            .filter(RemoteNode::is_folder)
            .ok_or_else(|| Error::ParentMissing(path.to_owned()))?;
        let siblings = self.entries_of(parent.id(), cancel).await?;
        if siblings.iter().any(|entry| entry.entry_name == name) {
            return Err(Error::AlreadyExists(path.to_owned()));
        }

        let url = self.url("folders2")?;
        let body = api::NewFolder {
            folder_name: name,
            parent_folder_id: parent.id(),
        };
        let resp = self.send(self.client.post(url).json(&body), cancel).await?;
        check_status(resp, path).await?;

        // the create reply carries no entry, re-list to pick up the id
        let entries = self.entries_of(parent.id(), cancel).await?;
        entries
            .into_iter()
            .find(|entry| entry.entry_name == name)
            .map(|entry| into_node(entry, path.to_owned()))
            .transpose()?
            .ok_or_else(|| transport_error!("created folder {path} is missing from its parent"))
    }

    async fn put_file(
        &self,
        data: impl io::AsyncRead + Send + Unpin,
        path: &Utf8Path,
        mtime: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> Result<RemoteNode> {
        let parent_path = path.parent().unwrap_or(Utf8Path::new(""));
        let name = path
            .file_name()
            .ok_or_else(|| Error::NotFound(path.to_owned()))?;
        let parent = self
            .node_at(parent_path, cancel)
            .await?
            .filter(RemoteNode::is_folder)
            .ok_or_else(|| Error::ParentMissing(path.to_owned()))?;

        let mut data = data;
        let mut content = Vec::new();
        io::AsyncReadExt::read_to_end(&mut data, &mut content).await?;
        let size = content.len() as u64;

        let url = self.url("documents2")?;
        let body = api::NewDocument {
            file_name: name,
            parent_folder_id: parent.id(),
            modified_date: mtime.map(|t| t.to_rfc3339()),
        };
        let resp = self.send(self.client.post(url).json(&body), cancel).await?;
        let resp = check_status(resp, path).await?;
        let reply: api::NewDocumentReply = decode(resp).await?;

        let url = self.url(&format!("documents/{}/file", reply.document_id))?;
        let part = reqwest::multipart::Part::bytes(content).file_name(name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let resp = self
            .send(self.client.put(url).multipart(form), cancel)
            .await?;
        check_status(resp, path).await?;

        Ok(RemoteNode::new(
            reply.document_id,
            path.to_owned(),
            NodeKind::Document {
                size,
                mtime: mtime.unwrap_or_else(Utc::now),
            },
        ))
    }

    async fn get_file(
        &self,
        path: &Utf8Path,
        sink: impl io::AsyncWrite + Send + Unpin,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let node = self
            .node_at(path, cancel)
            .await?
            .ok_or_else(|| Error::NotFound(path.to_owned()))?;
        if node.is_folder() {
            return Err(Error::TypeMismatch(path.to_owned()));
        }
        let url = self.url(&format!("documents/{}/file", node.id()))?;
        let resp = self.send(self.client.get(url), cancel).await?;
        let resp = check_status(resp, path).await?;

        let mut sink = sink;
        let mut stream = Box::pin(resp.bytes_stream());
        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                chunk = stream.try_next() => {
                    chunk.map_err(|err| transport_error!("{err}"))?
                }
            };
            match chunk {
                Some(bytes) => io::AsyncWriteExt::write_all(&mut sink, &bytes).await?,
                None => break,
            }
        }
        io::AsyncWriteExt::flush(&mut sink).await?;
        Ok(())
    }

    async fn delete_node(&self, path: &Utf8Path, cancel: &CancellationToken) -> Result<()> {
        let node = self
            .node_at(path, cancel)
            .await?
            .ok_or_else(|| Error::NotFound(path.to_owned()))?;
        let endpoint = if node.is_folder() {
            format!("folders/{}", node.id())
        } else {
            format!("documents/{}", node.id())
        };
        let url = self.url(&endpoint)?;
        let resp = self.send(self.client.delete(url), cancel).await?;
        check_status(resp, path).await?;
        Ok(())
    }
}

fn into_node(entry: api::Entry, path: Utf8PathBuf) -> Result<RemoteNode> {
    let kind = match entry.entry_type {
        api::EntryType::Folder => NodeKind::Folder,
        api::EntryType::Document => {
            let size = match &entry.file_size {
                Some(size) => parse_num(size, "file_size")?,
                None => 0,
            };
            let mtime = match &entry.modified_date {
                Some(date) => DateTime::parse_from_rfc3339(date)
                    .map_err(|err| transport_error!("bad modified_date '{date}': {err}"))?
                    .with_timezone(&Utc),
                None => DateTime::<Utc>::UNIX_EPOCH,
            };
            NodeKind::Document { size, mtime }
        }
    };
    Ok(RemoteNode::new(entry.entry_id, path, kind))
}

fn into_access_point(entry: api::AccessPointEntry) -> Result<crate::device::AccessPoint> {
    let security = match entry.security.as_str() {
        "nonsec" => crate::device::WifiSecurity::Open,
        "psk" => crate::device::WifiSecurity::Psk,
        other => return Err(transport_error!("unknown wifi security '{other}'")),
    };
    Ok(crate::device::AccessPoint {
        ssid: entry.ssid,
        security,
    })
}

fn parse_num(value: &str, field: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| transport_error!("non-numeric {field}: '{value}'"))
}

async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    resp.json()
        .await
        .map_err(|err| transport_error!("decoding device reply: {err}"))
}

async fn check_status(resp: reqwest::Response, path: &Utf8Path) -> Result<reqwest::Response> {
    match resp.status() {
        status if status.is_success() => Ok(resp),
        StatusCode::NOT_FOUND => Err(Error::NotFound(path.to_owned())),
        StatusCode::CONFLICT => Err(Error::AlreadyExists(path.to_owned())),
        StatusCode::INSUFFICIENT_STORAGE => Err(Error::QuotaExceeded),
        status => {
            let body = resp.text().await.unwrap_or_default();
            Err(transport_error!("device replied {status}: {body}"))
        }
    }
}
