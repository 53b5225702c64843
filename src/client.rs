//! REST client for an IL2 node.
//!
//! [`RestNode`] talks to a node over mutually authenticated HTTPS using the
//! client certificate from a PKCS#12 bundle. The HTTP session, and the
//! temporary PEM file it authenticates with, are created on the first request
//! and released when the node is dropped.
//!
//! [`RestChain`] borrows its node and exposes the operations on one chain.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::Identity;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::certificate::{CredentialFile, Pkcs12Certificate};
use crate::config::ClientConfig;
use crate::enumerations::{NetworkPredefinedPorts, RecordType};
use crate::error::{Il2Error, Result};
use crate::marshal::{self, from_json_list, Model};
use crate::models::document::PLAIN_TEXT;
use crate::models::{
    AppsModel, ChainCreatedModel, ChainCreationModel, ChainIdModel, ChainSummaryModel,
    DocumentDetailsModel, DocumentUploadConfigurationModel, DocumentUploadModel,
    DocumentsBeginTransactionModel, DocumentsMetadataModel, DocumentsTransactionModel,
    ForceInterlockModel, InterlockingRecordModel, JsonDocumentRecordModel, KeyModel,
    KeyPermitModel, NewRecordModel, NewRecordModelAsJson, NodeDetailsModel, PageOf, PeerModel,
    RawDocumentModel, RecordModel, RecordModelAsJson,
};
use crate::uri::SimpleUri;
use crate::util::build_query;

const JSON: &str = "application/json";
const JSON_BODY: &str = "application/json; charset=utf-8";
const IL2_PAYLOAD: &str = "application/interlockledger";
const ANY: &str = "*/*";
const OCTET_STREAM: &str = "application/octet-stream";

static FILENAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|;)\s*filename\s*=\s*"?([^";]+)"?"#).expect("filename pattern is valid")
});

/// File name announced by a `Content-Disposition` header.
fn disposition_filename(disposition: &str) -> Option<String> {
    FILENAME_PATTERN
        .captures(disposition)
        .map(|captures| captures[1].trim().to_string())
        .filter(|name| !name.is_empty())
}

struct Session {
    client: Client,
    // Kept alive for as long as the client may authenticate with it.
    _credentials: CredentialFile,
}

/// Connection to an IL2 node.
pub struct RestNode {
    base_uri: SimpleUri,
    certificate: Pkcs12Certificate,
    verify_ca: bool,
    session: OnceCell<Session>,
}

impl RestNode {
    /// Connect with a `.pfx` client certificate
    ///
    /// # Arguments
    /// * `cert_path` - PKCS#12 bundle permitted on the node
    /// * `password` - Bundle password
    /// * `address` - `[scheme://]hostname[:port][/]`
    /// * `port` - Defaults to the MainNet API port
    /// * `verify_ca` - Check the node's TLS certificate chain
    pub fn new<P: AsRef<Path>>(
        cert_path: P,
        password: &str,
        address: &str,
        port: Option<u16>,
        verify_ca: bool,
    ) -> Result<Self> {
        let certificate = Pkcs12Certificate::load(cert_path, password)?;
        let port = port.unwrap_or_else(|| NetworkPredefinedPorts::MainNet.port());
        let base_uri = SimpleUri::new(address, Some(port))?;
        Ok(Self::with_certificate(certificate, base_uri, verify_ca))
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(
            &config.certificate.path,
            config.certificate.password.expose_secret(),
            &config.host.address,
            Some(config.host.port),
            config.host.verify_ca,
        )
    }

    pub fn with_certificate(
        certificate: Pkcs12Certificate,
        base_uri: SimpleUri,
        verify_ca: bool,
    ) -> Self {
        Self {
            base_uri,
            certificate,
            verify_ca,
            session: OnceCell::new(),
        }
    }

    pub fn base_uri(&self) -> &SimpleUri {
        &self.base_uri
    }

    /// Friendly name of the client certificate.
    pub fn certificate_name(&self) -> &str {
        self.certificate.friendly_name()
    }

    pub fn api_version(&self) -> Result<String> {
        Ok(match self.get("/apiVersion")? {
            Value::String(version) => version,
            other => other.to_string(),
        })
    }

    pub fn details(&self) -> Result<NodeDetailsModel> {
        NodeDetailsModel::from_json(self.get("/")?)
    }

    /// Apps valid on the node's network.
    pub fn apps(&self) -> Result<AppsModel> {
        AppsModel::from_json(self.get("/apps")?)
    }

    pub fn chains(&self) -> Result<Vec<RestChain<'_>>> {
        let ids: Vec<ChainIdModel> = from_json_list(self.get("/chain")?)?;
        Ok(ids.into_iter().map(|id| RestChain::new(self, id)).collect())
    }

    pub fn chain_by_id(&self, chain_id: &str) -> Result<RestChain<'_>> {
        let id = ChainIdModel::from_json(self.get(&format!("/chain/{}", chain_id))?)?;
        Ok(RestChain::new(self, id))
    }

    pub fn peers(&self) -> Result<Vec<PeerModel>> {
        from_json_list(self.get("/peers")?)
    }

    pub fn mirrors(&self) -> Result<Vec<RestChain<'_>>> {
        let ids: Vec<ChainIdModel> = from_json_list(self.get("/mirrors")?)?;
        Ok(ids.into_iter().map(|id| RestChain::new(self, id)).collect())
    }

    /// Start mirroring the given chains.
    pub fn add_mirrors_of(&self, chain_ids: &[String]) -> Result<Vec<ChainIdModel>> {
        from_json_list(self.post("/mirrors", chain_ids)?)
    }

    pub fn documents_config(&self) -> Result<DocumentUploadConfigurationModel> {
        DocumentUploadConfigurationModel::from_json(self.get("/documents/configuration")?)
    }

    pub fn create_chain(&self, model: &ChainCreationModel) -> Result<ChainCreatedModel> {
        ChainCreatedModel::from_json(self.post("/chain", model)?)
    }

    /// Interlocking records pointing to `chain_id`.
    pub fn interlocks_of(&self, chain_id: &str) -> Result<Vec<InterlockingRecordModel>> {
        from_json_list(self.get(&format!("/interlockings/{}", chain_id))?)
    }

    fn client(&self) -> Result<&Client> {
        let session = self.session.get_or_try_init(|| {
            let credentials = CredentialFile::create(&self.certificate)?;
            let identity = Identity::from_pem(credentials.read()?.expose_secret())?;
            let client = Client::builder()
                .identity(identity)
                .danger_accept_invalid_certs(!self.verify_ca)
                .build()?;
            debug!(
                node = %self.base_uri,
                certificate = %self.certificate_name(),
                verify_ca = self.verify_ca,
                "session created"
            );
            Ok::<_, Il2Error>(Session {
                client,
                _credentials: credentials,
            })
        })?;
        Ok(&session.client)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send()?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let mut message = response.text()?;
            if message.is_empty() {
                message = status.canonical_reason().unwrap_or_default().to_string();
            }
            warn!(status = status.as_u16(), %message, "node refused request");
            return Err(Il2Error::Node {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    fn read_json(response: Response) -> Result<Value> {
        let text = response.text()?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub(crate) fn get(&self, path: &str) -> Result<Value> {
        let url = self.base_uri.build(path);
        debug!(%url, "GET");
        let request = self.client()?.get(&url).header(ACCEPT, JSON);
        Self::read_json(self.send(request)?)
    }

    /// GET without decoding, for bodies that are not JSON.
    pub(crate) fn get_raw(&self, path: &str, accept: &str) -> Result<Response> {
        let url = self.base_uri.build(path);
        debug!(%url, accept, "GET raw");
        let request = self.client()?.get(&url).header(ACCEPT, accept);
        self.send(request)
    }

    pub(crate) fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        let url = self.base_uri.build(path);
        let body = marshal::to_json(body, true)?;
        debug!(%url, "POST");
        let request = self
            .client()?
            .post(&url)
            .header(ACCEPT, JSON)
            .header(CONTENT_TYPE, JSON_BODY)
            .body(serde_json::to_vec(&body)?);
        Self::read_json(self.send(request)?)
    }

    pub(crate) fn post_raw(&self, path: &str, body: Vec<u8>, content_type: &str) -> Result<Value> {
        let url = self.base_uri.build(path);
        debug!(%url, content_type, size = body.len(), "POST raw");
        let request = self
            .client()?
            .post(&url)
            .header(ACCEPT, JSON)
            .header(CONTENT_TYPE, content_type)
            .body(body);
        Self::read_json(self.send(request)?)
    }
}

impl fmt::Debug for RestNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestNode")
            .field("base_uri", &self.base_uri.to_string())
            .field("certificate", &self.certificate_name())
            .field("verify_ca", &self.verify_ca)
            .field("connected", &self.session.get().is_some())
            .finish()
    }
}

/// A file served by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    /// Taken from the `Content-Disposition` header.
    pub name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl DownloadedFile {
    fn from_response(response: Response) -> Result<Self> {
        let name = header_text(response.headers(), CONTENT_DISPOSITION)
            .as_deref()
            .and_then(disposition_filename)
            .ok_or_else(|| {
                Il2Error::InvalidValue("response does not name the downloaded file".to_string())
            })?;
        let content_type = header_text(response.headers(), CONTENT_TYPE)
            .unwrap_or_else(|| OCTET_STREAM.to_string());
        let content = response.bytes()?.to_vec();
        debug!(%name, %content_type, size = content.len(), "file downloaded");
        Ok(Self {
            name,
            content_type,
            content,
        })
    }

    /// Write the file into `dir` under its own name.
    pub fn save_to<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        // Only the last component, so a served name cannot escape `dir`.
        let file_name = Path::new(&self.name).file_name().ok_or_else(|| {
            Il2Error::Validation(format!("'{}' is not a usable file name", self.name))
        })?;
        let path = dir.as_ref().join(file_name);
        fs::write(&path, &self.content)?;
        Ok(path)
    }
}

/// File ids end in `#SHA256`, which a URL would read as a fragment.
fn escape_id(id: &str) -> String {
    id.replace('#', "%23")
}

fn header_text(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Paging and bounds of a record listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    pub first_serial: Option<u64>,
    pub last_serial: Option<u64>,
    pub page: u64,
    /// Zero returns everything.
    pub page_size: u64,
    pub last_to_first: bool,
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            first_serial: None,
            last_serial: None,
            page: 0,
            page_size: 10,
            last_to_first: false,
        }
    }
}

impl RecordQuery {
    pub fn to_query_string(&self) -> String {
        build_query(&[
            ("firstSerial", self.first_serial.map(|s| s.to_string())),
            ("lastSerial", self.last_serial.map(|s| s.to_string())),
            ("page", Some(self.page.to_string())),
            ("pageSize", Some(self.page_size.to_string())),
            ("lastToFirst", Some(self.last_to_first.to_string())),
        ])
    }
}

/// Operations on one chain of a node.
pub struct RestChain<'a> {
    node: &'a RestNode,
    id: ChainIdModel,
}

impl<'a> RestChain<'a> {
    fn new(node: &'a RestNode, id: ChainIdModel) -> Self {
        Self { node, id }
    }

    pub fn id(&self) -> &str {
        &self.id.id
    }

    pub fn name(&self) -> Option<&str> {
        self.id.name.as_deref()
    }

    pub fn summary(&self) -> Result<ChainSummaryModel> {
        ChainSummaryModel::from_json(self.node.get(&format!("/chain/{}", self.id()))?)
    }

    pub fn active_apps(&self) -> Result<Vec<u64>> {
        let apps = self.node.get(&format!("/chain/{}/activeApps", self.id()))?;
        Ok(serde_json::from_value(apps)?)
    }

    /// Enable apps on the chain; returns the active apps afterwards.
    pub fn permit_apps(&self, apps: &[u64]) -> Result<Vec<u64>> {
        let apps = self
            .node
            .post(&format!("/chain/{}/activeApps", self.id()), apps)?;
        Ok(serde_json::from_value(apps)?)
    }

    pub fn permitted_keys(&self) -> Result<Vec<KeyModel>> {
        from_json_list(self.node.get(&format!("/chain/{}/key", self.id()))?)
    }

    /// Permit keys on the chain; returns every permitted key afterwards.
    pub fn permit_keys(&self, keys: &[KeyPermitModel]) -> Result<Vec<KeyModel>> {
        from_json_list(self.node.post(&format!("/chain/{}/key", self.id()), keys)?)
    }

    pub fn interlocks(
        &self,
        how_many_from_last: u64,
        page: u64,
        page_size: u64,
    ) -> Result<PageOf<InterlockingRecordModel>> {
        let query = build_query(&[
            ("howManyFromLast", Some(how_many_from_last)),
            ("page", Some(page)),
            ("pageSize", Some(page_size)),
        ]);
        PageOf::from_json(
            self.node
                .get(&format!("/chain/{}/interlockings{}", self.id(), query))?,
        )
    }

    pub fn force_interlock(&self, model: &ForceInterlockModel) -> Result<InterlockingRecordModel> {
        InterlockingRecordModel::from_json(
            self.node
                .post(&format!("/chain/{}/interlockings", self.id()), model)?,
        )
    }

    pub fn records(&self, query: &RecordQuery) -> Result<PageOf<RecordModel>> {
        PageOf::from_json(self.node.get(&format!(
            "/records@{}{}",
            self.id(),
            query.to_query_string()
        ))?)
    }

    pub fn records_as_json(&self, query: &RecordQuery) -> Result<PageOf<RecordModelAsJson>> {
        PageOf::from_json(self.node.get(&format!(
            "/records@{}/asJson{}",
            self.id(),
            query.to_query_string()
        ))?)
    }

    pub fn record_at(&self, serial: u64) -> Result<RecordModel> {
        RecordModel::from_json(self.node.get(&format!("/records@{}/{}", self.id(), serial))?)
    }

    pub fn record_at_as_json(&self, serial: u64) -> Result<RecordModelAsJson> {
        RecordModelAsJson::from_json(
            self.node
                .get(&format!("/records@{}/{}/asJson", self.id(), serial))?,
        )
    }

    pub fn add_record(&self, model: &NewRecordModel) -> Result<RecordModel> {
        RecordModel::from_json(self.node.post(&format!("/records@{}", self.id()), model)?)
    }

    /// Append a record whose payload is already ILTag encoded.
    pub fn add_record_unpacked(
        &self,
        application_id: u64,
        payload_tag_id: u64,
        record_type: RecordType,
        payload: Vec<u8>,
    ) -> Result<RecordModel> {
        let query = build_query(&[
            ("applicationId", Some(application_id.to_string())),
            ("payloadTagId", Some(payload_tag_id.to_string())),
            ("type", Some(record_type.to_string())),
        ]);
        RecordModel::from_json(self.node.post_raw(
            &format!("/records@{}/with{}", self.id(), query),
            payload,
            IL2_PAYLOAD,
        )?)
    }

    pub fn add_record_as_json(&self, model: &NewRecordModelAsJson) -> Result<RecordModelAsJson> {
        RecordModelAsJson::from_json(self.node.post(
            &format!("/records@{}/asJson{}", self.id(), model.to_query_string()),
            &model.json,
        )?)
    }

    pub fn json_document_at(&self, serial: u64) -> Result<JsonDocumentRecordModel> {
        JsonDocumentRecordModel::from_json(
            self.node
                .get(&format!("/jsonDocuments@{}/{}", self.id(), serial))?,
        )
    }

    /// JSON documents stored between two serials, both optional.
    pub fn json_documents_from(
        &self,
        first_serial: Option<u64>,
        last_serial: Option<u64>,
    ) -> Result<Vec<JsonDocumentRecordModel>> {
        let query = build_query(&[("firstSerial", first_serial), ("lastSerial", last_serial)]);
        from_json_list(
            self.node
                .get(&format!("/jsonDocuments@{}{}", self.id(), query))?,
        )
    }

    /// The JSON document at `serial`, as the node's own JSON text.
    pub fn json_document_at_as_str(&self, serial: u64) -> Result<String> {
        let response = self.node.get_raw(
            &format!("/jsonDocuments@{}/{}/asJson", self.id(), serial),
            JSON,
        )?;
        Ok(response.text()?)
    }

    /// Store a JSON document; the node encrypts it for the chain's readers.
    pub fn store_json_document(&self, document: &Value) -> Result<JsonDocumentRecordModel> {
        JsonDocumentRecordModel::from_json(
            self.node
                .post(&format!("/jsonDocuments@{}", self.id()), document)?,
        )
    }

    /// Documents stored on this chain.
    pub fn documents(&self) -> Result<Vec<DocumentDetailsModel>> {
        from_json_list(self.node.get(&format!("/documents@{}", self.id()))?)
    }

    /// Store one document described by `model`.
    pub fn store_document(
        &self,
        model: &DocumentUploadModel,
        content: Vec<u8>,
    ) -> Result<DocumentDetailsModel> {
        model.validate()?;
        DocumentDetailsModel::from_json(self.node.post_raw(
            &format!("/documents@{}{}", self.id(), model.to_query_string()),
            content,
            &model.content_type,
        )?)
    }

    pub fn store_raw_document(&self, document: &RawDocumentModel) -> Result<DocumentDetailsModel> {
        let model = DocumentUploadModel::new(&document.name, &document.content_type)?;
        self.store_document(&model, document.content.clone())
    }

    pub fn store_document_from_text(&self, content: &str, name: &str) -> Result<DocumentDetailsModel> {
        let model = DocumentUploadModel::new(name, PLAIN_TEXT)?;
        self.store_document(&model, content.as_bytes().to_vec())
    }

    /// Store a file; `name` defaults to the file's own name.
    pub fn store_document_from_file<P: AsRef<Path>>(
        &self,
        path: P,
        content_type: &str,
        name: Option<&str>,
    ) -> Result<DocumentDetailsModel> {
        let path = path.as_ref();
        let content = fs::read(path)?;
        let name = match name {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let model = DocumentUploadModel::new(&name, content_type)?;
        self.store_document(&model, content)
    }

    pub fn document_as_raw(&self, file_id: &str) -> Result<RawDocumentModel> {
        let path = format!("/documents@{}/{}", self.id(), escape_id(file_id));
        let file = DownloadedFile::from_response(self.node.get_raw(&path, ANY)?)?;
        RawDocumentModel::new(&file.name, &file.content_type, file.content)
    }

    pub fn document_as_plain(&self, file_id: &str) -> Result<String> {
        let path = format!("/documents@{}/{}", self.id(), escape_id(file_id));
        let response = self.node.get_raw(&path, PLAIN_TEXT)?;
        Ok(response.text()?)
    }

    /// Begin a multi-document transaction on this chain.
    ///
    /// The model's `chain` is replaced by this chain's id.
    pub fn documents_begin_transaction(
        &self,
        model: &DocumentsBeginTransactionModel,
    ) -> Result<DocumentsTransactionModel> {
        let mut model = model.clone();
        model.chain = self.id().to_string();
        DocumentsTransactionModel::from_json(self.node.post("/documents/transaction", &model)?)
    }

    pub fn documents_transaction_status(
        &self,
        transaction_id: &str,
    ) -> Result<DocumentsTransactionModel> {
        DocumentsTransactionModel::from_json(
            self.node
                .get(&format!("/documents/transaction/{}", transaction_id))?,
        )
    }

    /// Upload one document into an open transaction.
    ///
    /// `relative_path` places the document inside the set, `/` when `None`.
    pub fn documents_transaction_add_item(
        &self,
        transaction_id: &str,
        name: &str,
        comment: Option<&str>,
        relative_path: Option<&str>,
        content_type: &str,
        content: Vec<u8>,
    ) -> Result<DocumentsTransactionModel> {
        let query = build_query(&[
            ("path", Some(relative_path.unwrap_or("/"))),
            ("name", Some(name)),
            ("comment", comment),
        ]);
        DocumentsTransactionModel::from_json(self.node.post_raw(
            &format!("/documents/transaction/{}{}", transaction_id, query),
            content,
            content_type,
        )?)
    }

    /// Store the uploaded documents; returns the documents storage locator.
    pub fn documents_transaction_commit(&self, transaction_id: &str) -> Result<String> {
        let locator = self.node.post(
            &format!("/documents/transaction/{}/commit", transaction_id),
            &Value::Null,
        )?;
        match locator {
            Value::String(locator) => Ok(locator),
            other => Err(Il2Error::InvalidValue(format!(
                "expected a documents locator but got {}",
                other
            ))),
        }
    }

    pub fn documents_transaction_metadata(&self, locator: &str) -> Result<DocumentsMetadataModel> {
        DocumentsMetadataModel::from_json(
            self.node
                .get(&format!("/documents/{}/metadata", locator))?,
        )
    }

    /// Document at `index` of a committed set.
    pub fn download_single_document_at(&self, locator: &str, index: u64) -> Result<DownloadedFile> {
        DownloadedFile::from_response(
            self.node
                .get_raw(&format!("/documents/{}/{}", locator, index), ANY)?,
        )
    }

    /// Every document of a committed set, compressed into one zip file.
    pub fn download_documents_as_zip(&self, locator: &str) -> Result<DownloadedFile> {
        DownloadedFile::from_response(
            self.node
                .get_raw(&format!("/documents/{}/zip", locator), ANY)?,
        )
    }
}

impl fmt::Display for RestChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppPermissions;
    use crate::enumerations::KeyPurpose;
    use crate::test_utils::{reader, READER_BUNDLE, TEST_PASSWORD};
    use serde_json::json;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    struct Reply {
        status: u16,
        headers: Vec<(&'static str, String)>,
        body: Vec<u8>,
    }

    impl Reply {
        fn json(status: u16, body: String) -> Self {
            Self {
                status,
                headers: vec![("Content-Type", JSON.to_string())],
                body: body.into_bytes(),
            }
        }

        fn file(content_type: &str, disposition: &str, body: &[u8]) -> Self {
            Self {
                status: 200,
                headers: vec![
                    ("Content-Type", content_type.to_string()),
                    ("Content-Disposition", disposition.to_string()),
                ],
                body: body.to_vec(),
            }
        }
    }

    fn serve(responses: Vec<(u16, String)>) -> (SimpleUri, mpsc::Receiver<String>) {
        serve_replies(
            responses
                .into_iter()
                .map(|(status, body)| Reply::json(status, body))
                .collect(),
        )
    }

    /// Serve canned responses, one per connection, and report each request.
    fn serve_replies(responses: Vec<Reply>) -> (SimpleUri, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            for reply in responses {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());

                let mut request = String::new();
                let mut content_length = 0;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                        content_length = value.trim().parse().unwrap();
                    }
                    request.push_str(&line);
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                }
                let mut body_in = vec![0u8; content_length];
                reader.read_exact(&mut body_in).unwrap();
                request.push_str(&String::from_utf8_lossy(&body_in));
                tx.send(request).unwrap();

                let mut stream = stream;
                let mut head = format!("HTTP/1.1 {} X\r\n", reply.status);
                for (name, value) in &reply.headers {
                    head.push_str(&format!("{}: {}\r\n", name, value));
                }
                head.push_str(&format!(
                    "Content-Length: {}\r\nConnection: close\r\n\r\n",
                    reply.body.len()
                ));
                stream.write_all(head.as_bytes()).unwrap();
                stream.write_all(&reply.body).unwrap();
            }
        });

        let uri = SimpleUri::new(&format!("http://127.0.0.1:{}", port), None).unwrap();
        (uri, rx)
    }

    fn node(uri: SimpleUri) -> RestNode {
        RestNode::with_certificate(reader(), uri, false)
    }

    fn chain_json() -> String {
        json!({"id": "abc", "name": "main", "licensingStatus": "Licensed"}).to_string()
    }

    #[test]
    fn test_new_requires_valid_bundle_and_address() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&READER_BUNDLE).unwrap();

        let node = RestNode::new(file.path(), TEST_PASSWORD, "node.il2", None, true).unwrap();
        assert_eq!(node.base_uri().build("/"), "https://node.il2:32032/");
        assert_eq!(node.certificate_name(), "Reader Key");
        assert!(format!("{:?}", node).contains("connected: false"));

        assert!(matches!(
            RestNode::new(file.path(), "wrong", "node.il2", None, true),
            Err(Il2Error::Authentication(_))
        ));
        assert!(matches!(
            RestNode::new(file.path(), TEST_PASSWORD, "-bad-", None, true),
            Err(Il2Error::Validation(_))
        ));
    }

    #[test]
    fn test_chain_by_id_and_summary() {
        let summary = json!({"id": "abc", "activeApps": [1, 4], "lastRecord": 9}).to_string();
        let (uri, requests) = serve(vec![(200, chain_json()), (200, summary)]);
        let node = node(uri);

        let chain = node.chain_by_id("abc").unwrap();
        assert_eq!(chain.to_string(), "Chain 'main' #abc (Licensed)");
        assert!(requests.recv().unwrap().starts_with("GET /chain/abc HTTP/1.1"));

        let summary = chain.summary().unwrap();
        assert_eq!(summary.active_apps, vec![1, 4]);
        assert_eq!(summary.last_record, Some(9));
    }

    #[test]
    fn test_node_error_carries_status_and_body() {
        let (uri, _requests) = serve(vec![(404, "Chain not found".to_string()), (500, String::new())]);
        let node = node(uri);

        match node.chain_by_id("missing") {
            Err(Il2Error::Node { status, message }) => {
                assert_eq!(status, 404);
                assert_eq!(message, "Chain not found");
            }
            other => panic!("unexpected {:?}", other.map(|c| c.id().to_string())),
        }
        assert!(matches!(node.api_version(), Err(Il2Error::Node { status: 500, .. })));
    }

    #[test]
    fn test_permit_keys_posts_wire_models() {
        let keys = json!([{
            "id": "Key!x#SHA1", "name": "k", "publicKey": "pk",
            "permissions": ["#4"], "purposes": ["Action"]
        }])
        .to_string();
        let (uri, requests) = serve(vec![(200, chain_json()), (200, keys)]);
        let node = node(uri);
        let chain = node.chain_by_id("abc").unwrap();
        requests.recv().unwrap();

        let permit = KeyPermitModel::new(
            "Key!x#SHA1",
            "k",
            "pk",
            vec![AppPermissions::all_actions(4)],
            vec![KeyPurpose::Action],
        )
        .unwrap();
        let permitted = chain.permit_keys(&[permit]).unwrap();
        assert_eq!(permitted[0].permissions, vec![AppPermissions::all_actions(4)]);

        let request = requests.recv().unwrap();
        assert!(request.starts_with("POST /chain/abc/key HTTP/1.1"));
        assert!(request.contains("\"permissions\":[\"#4\"]"));
    }

    #[test]
    fn test_records_query_and_paging() {
        let page = json!({
            "items": [{
                "applicationId": 1, "chainId": "abc",
                "createdAt": "2020-02-26T23:17:03.0189753-03:00",
                "hash": "h#SHA256", "payloadTagId": 300, "serial": 2,
                "type": "Data", "version": 1, "payloadBytes": "AQ=="
            }],
            "page": 0, "pageSize": 10, "totalNumberOfPages": 1
        })
        .to_string();
        let (uri, requests) = serve(vec![(200, chain_json()), (200, page)]);
        let node = node(uri);
        let chain = node.chain_by_id("abc").unwrap();
        requests.recv().unwrap();

        let query = RecordQuery {
            first_serial: Some(2),
            ..RecordQuery::default()
        };
        let records = chain.records(&query).unwrap();
        assert_eq!(records.items[0].payload_bytes, vec![1]);
        assert!(requests.recv().unwrap().starts_with(
            "GET /records@abc?firstSerial=2&page=0&pageSize=10&lastToFirst=false HTTP/1.1"
        ));
    }

    #[test]
    fn test_commit_returns_locator() {
        let (uri, requests) = serve(vec![
            (200, chain_json()),
            (200, "\"EbAfcWGwCwzuiEtSwIwYQYIHy-g05CZl6jrcBAYuYRIe\"".to_string()),
        ]);
        let node = node(uri);
        let chain = node.chain_by_id("abc").unwrap();
        requests.recv().unwrap();

        let locator = chain.documents_transaction_commit("tx1").unwrap();
        assert_eq!(locator, "EbAfcWGwCwzuiEtSwIwYQYIHy-g05CZl6jrcBAYuYRIe");
        assert!(requests
            .recv()
            .unwrap()
            .starts_with("POST /documents/transaction/tx1/commit HTTP/1.1"));
    }

    #[test]
    fn test_add_item_posts_raw_content() {
        let status = json!({
            "chain": "abc", "transactionId": "tx1", "canCommitNow": true,
            "countOfUploadedDocuments": 1, "timeOutLimit": "2021-04-01T12:00:00+00:00"
        })
        .to_string();
        let (uri, requests) = serve(vec![(200, chain_json()), (200, status)]);
        let node = node(uri);
        let chain = node.chain_by_id("abc").unwrap();
        requests.recv().unwrap();

        let status = chain
            .documents_transaction_add_item("tx1", "a.txt", None, None, "text/plain", b"hello".to_vec())
            .unwrap();
        assert_eq!(status.count_of_uploaded_documents, 1);

        let request = requests.recv().unwrap();
        assert!(request.starts_with("POST /documents/transaction/tx1?path=/&name=a.txt HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("content-type: text/plain"));
        assert!(request.ends_with("hello"));
    }

    fn chain_on(replies: Vec<Reply>) -> (RestNode, mpsc::Receiver<String>) {
        let (uri, requests) = serve_replies(replies);
        (node(uri), requests)
    }

    fn chain_abc(node: &RestNode) -> RestChain<'_> {
        RestChain::new(node, ChainIdModel::from_json(json!({"id": "abc"})).unwrap())
    }

    fn document_json(name: &str) -> String {
        json!({
            "cipher": "None", "name": name, "contentType": "plain/text",
            "fileId": "ZegBNUskzzJRqKvIuOiuhyhJvXJ5YxMJL99ONvqkcXs#SHA256"
        })
        .to_string()
    }

    #[test]
    fn test_store_document_uses_upload_model() {
        let (node, requests) = chain_on(vec![
            Reply::json(200, document_json("bytes_file.txt")),
            Reply::json(200, document_json("doc.bin")),
        ]);
        let chain = chain_abc(&node);

        let model = DocumentUploadModel::new("bytes_file.txt", "plain/text").unwrap();
        let stored = chain.store_document(&model, b"Bytes message!".to_vec()).unwrap();
        assert_eq!(
            stored.to_string(),
            "Document 'bytes_file.txt' [plain/text] ZegBNUskzzJRqKvIuOiuhyhJvXJ5YxMJL99ONvqkcXs#SHA256"
        );
        let request = requests.recv().unwrap();
        assert!(request.starts_with("POST /documents@abc?cipher=None&name=bytes_file.txt HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("content-type: plain/text"));
        assert!(request.ends_with("Bytes message!"));

        let raw = RawDocumentModel::new("doc.bin", "application/octet-stream", vec![1, 2]).unwrap();
        chain.store_raw_document(&raw).unwrap();
        let request = requests.recv().unwrap();
        assert!(request.starts_with("POST /documents@abc?cipher=None&name=doc.bin HTTP/1.1"));
        assert!(request
            .to_ascii_lowercase()
            .contains("content-type: application/octet-stream"));
    }

    #[test]
    fn test_store_document_rejects_invalid_model() {
        let (uri, _requests) = serve(vec![]);
        let node = node(uri);
        let chain = chain_abc(&node);
        let mut model = DocumentUploadModel::new("a.txt", "plain/text").unwrap();
        model.name = " ".to_string();
        assert!(matches!(
            chain.store_document(&model, vec![1]),
            Err(Il2Error::Validation(_))
        ));
    }

    #[test]
    fn test_document_as_raw_reads_disposition() {
        let (node, requests) = chain_on(vec![Reply::file(
            "application/pdf",
            "attachment; filename=report.pdf; filename*=UTF-8''report.pdf",
            &[0x25, 0x50, 0x44, 0x46],
        )]);
        let chain = chain_abc(&node);

        let document = chain.document_as_raw("fid#SHA256").unwrap();
        assert_eq!(document.name, "report.pdf");
        assert_eq!(document.content_type, "application/pdf");
        assert_eq!(document.content, b"%PDF");
        assert!(requests
            .recv()
            .unwrap()
            .starts_with("GET /documents@abc/fid%23SHA256 HTTP/1.1"));
    }

    #[test]
    fn test_downloads_name_files_from_disposition() {
        let (node, requests) = chain_on(vec![
            Reply::file("text/plain", "attachment; filename=\"a.txt\";", b"hello"),
            Reply::file("application/zip", "attachment; filename=set.zip", b"PK\x03\x04"),
            Reply::json(200, "{}".to_string()),
        ]);
        let chain = chain_abc(&node);

        let single = chain.download_single_document_at("loc", 0).unwrap();
        assert_eq!(single.name, "a.txt");
        assert_eq!(single.content, b"hello");
        assert!(requests.recv().unwrap().starts_with("GET /documents/loc/0 HTTP/1.1"));

        let zip = chain.download_documents_as_zip("loc").unwrap();
        assert_eq!(zip.name, "set.zip");
        assert_eq!(zip.content_type, "application/zip");
        assert!(requests.recv().unwrap().starts_with("GET /documents/loc/zip HTTP/1.1"));

        let dir = tempfile::tempdir().unwrap();
        let path = zip.save_to(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("set.zip"));
        assert_eq!(std::fs::read(path).unwrap(), b"PK\x03\x04");

        assert!(matches!(
            chain.download_documents_as_zip("loc"),
            Err(Il2Error::InvalidValue(_))
        ));
    }

    #[test]
    fn test_saved_file_stays_in_directory() {
        let file = DownloadedFile {
            name: "../../etc/passwd".to_string(),
            content_type: OCTET_STREAM.to_string(),
            content: b"x".to_vec(),
        };
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(file.save_to(dir.path()).unwrap(), dir.path().join("passwd"));
    }

    #[test]
    fn test_disposition_filename() {
        assert_eq!(disposition_filename("attachment; filename=x.txt").as_deref(), Some("x.txt"));
        assert_eq!(
            disposition_filename("attachment; filename=\"with space.txt\"").as_deref(),
            Some("with space.txt")
        );
        assert_eq!(disposition_filename("attachment; filename*=UTF-8''x.txt"), None);
        assert_eq!(disposition_filename("inline"), None);
    }

    #[test]
    fn test_json_documents_listing_and_text() {
        let stored = json!([{
            "applicationId": 8, "chainId": "abc",
            "createdAt": "2021-03-01T10:00:00.000000+00:00",
            "hash": "h#SHA256", "payloadTagId": 2100, "serial": 5,
            "type": "Data", "version": 1,
            "jsonText": "{\"a\":1}"
        }])
        .to_string();
        let (node, requests) = chain_on(vec![
            Reply::json(200, stored),
            Reply::json(200, "{\"a\": 1}".to_string()),
        ]);
        let chain = chain_abc(&node);

        let documents = chain.json_documents_from(Some(5), None).unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].serial, 5);
        assert!(requests
            .recv()
            .unwrap()
            .starts_with("GET /jsonDocuments@abc?firstSerial=5 HTTP/1.1"));

        assert_eq!(chain.json_document_at_as_str(5).unwrap(), "{\"a\": 1}");
        assert!(requests
            .recv()
            .unwrap()
            .starts_with("GET /jsonDocuments@abc/5/asJson HTTP/1.1"));
    }

    #[test]
    fn test_record_query_defaults() {
        assert_eq!(
            RecordQuery::default().to_query_string(),
            "?page=0&pageSize=10&lastToFirst=false"
        );
    }
}
