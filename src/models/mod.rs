//! Request and response bodies exchanged with an IL2 node.

pub mod app;
pub mod chain;
pub mod document;
pub mod key;
pub mod node;
pub mod record;

pub use app::{
    AppPermissions, AppsModel, DataFieldModel, DataIndexElementModel, DataIndexModel, DataModel,
    PublishedApp,
};
pub use chain::{
    ChainCreatedModel, ChainCreationModel, ChainIdModel, ChainSummaryModel, ExportedKeyFile,
    ForceInterlockModel,
};
pub use document::{
    DirectoryEntry, DocumentDetailsModel, DocumentUploadConfigurationModel, DocumentUploadModel,
    DocumentsBeginTransactionModel, DocumentsMetadataModel, DocumentsTransactionModel,
    EncryptionParameters, RawDocumentModel,
};
pub use key::{CertificatePermitModel, KeyModel, KeyPermitModel, NameMismatch};
pub use node::{NodeDetailsModel, PeerModel, Versions};
pub use record::{
    InterlockingRecordModel, JsonDocumentRecordModel, NewRecordModel, NewRecordModelAsJson,
    PageOf, RecordModel, RecordModelAsJson,
};

pub use crate::encryption::{EncryptedTextModel, ReadingKeyModel};
