pub mod document_collection;
pub mod file_document_store;
pub mod postgres_document_store;
pub mod sqlite_document_store;
