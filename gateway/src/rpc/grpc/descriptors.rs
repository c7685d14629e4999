//! Loading protobuf descriptors
//!
//! Descriptors come from compiled `FileDescriptorSet` files
//! (`protoc --include_imports --descriptor_set_out=...`) or from the upstream
//! server's reflection service.

use std::collections::HashMap;
use std::path::PathBuf;

use prost::Message;
use prost_reflect::DescriptorPool;
use prost_types::FileDescriptorProto;
use tonic::transport::Channel;
use tonic_reflection::pb::v1::server_reflection_client::ServerReflectionClient;
use tonic_reflection::pb::v1::server_reflection_request::MessageRequest;
use tonic_reflection::pb::v1::server_reflection_response::MessageResponse;
use tonic_reflection::pb::v1::ServerReflectionRequest;

use crate::error::ProxyError;

const REFLECTION_SERVICE_PREFIX: &str = "grpc.reflection.";

/// Build a pool from descriptor set files.
pub fn load_descriptor_sets(paths: &[PathBuf]) -> Result<DescriptorPool, ProxyError> {
    let mut pool = DescriptorPool::new();
    for path in paths {
        let bytes = std::fs::read(path).map_err(|source| ProxyError::Io {
            path: path.clone(),
            source,
        })?;
        pool.decode_file_descriptor_set(bytes.as_slice())
            .map_err(|e| ProxyError::Descriptor(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("Loaded descriptor set {}", path.display());
    }
    Ok(pool)
}

/// Add every service the upstream exposes through server reflection.
pub async fn fetch_with_reflection(
    channel: Channel,
    pool: &mut DescriptorPool,
) -> Result<(), ProxyError> {
    let mut client = ServerReflectionClient::new(channel);

    let services = match reflect(&mut client, MessageRequest::ListServices(String::new())).await? {
        MessageResponse::ListServicesResponse(list) => list
            .service
            .into_iter()
            .map(|s| s.name)
            .filter(|name| !name.starts_with(REFLECTION_SERVICE_PREFIX))
            .collect::<Vec<_>>(),
        other => return Err(unexpected_response(&other)),
    };
    tracing::info!("Reflection reported {} service(s)", services.len());

    let mut files: HashMap<String, FileDescriptorProto> = HashMap::new();
    for service in &services {
        let request = MessageRequest::FileContainingSymbol(service.clone());
        let encoded = match reflect(&mut client, request).await? {
            MessageResponse::FileDescriptorResponse(response) => response.file_descriptor_proto,
            other => return Err(unexpected_response(&other)),
        };

        for bytes in encoded {
            let file = FileDescriptorProto::decode(bytes.as_slice()).map_err(|e| {
                ProxyError::Reflection(format!("Invalid descriptor for {}: {}", service, e))
            })?;
            files.entry(file.name().to_string()).or_insert(file);
        }
    }

    let fresh: Vec<FileDescriptorProto> = files
        .into_values()
        .filter(|file| pool.get_file_by_name(file.name()).is_none())
        .collect();
    pool.add_file_descriptor_protos(fresh)
        .map_err(|e| ProxyError::Descriptor(e.to_string()))?;

    Ok(())
}

async fn reflect(
    client: &mut ServerReflectionClient<Channel>,
    request: MessageRequest,
) -> Result<MessageResponse, ProxyError> {
    let request = ServerReflectionRequest {
        host: String::new(),
        message_request: Some(request),
    };

    let mut responses = client
        .server_reflection_info(tokio_stream::once(request))
        .await
        .map_err(|status| ProxyError::Reflection(status.message().to_string()))?
        .into_inner();

    let response = responses
        .message()
        .await
        .map_err(|status| ProxyError::Reflection(status.message().to_string()))?
        .ok_or_else(|| ProxyError::Reflection("Empty reflection response".to_string()))?;

    match response.message_response {
        Some(MessageResponse::ErrorResponse(error)) => Err(ProxyError::Reflection(format!(
            "{} (code {})",
            error.error_message, error.error_code
        ))),
        Some(other) => Ok(other),
        None => Err(ProxyError::Reflection("Reflection response had no body".to_string())),
    }
}

fn unexpected_response(response: &MessageResponse) -> ProxyError {
    let kind = match response {
        MessageResponse::FileDescriptorResponse(_) => "file descriptor",
        MessageResponse::AllExtensionNumbersResponse(_) => "extension numbers",
        MessageResponse::ListServicesResponse(_) => "service list",
        MessageResponse::ErrorResponse(_) => "error",
    };
    ProxyError::Reflection(format!("Unexpected {} response", kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::grpc::tests::greeter_file;
    use prost_types::FileDescriptorSet;

    #[test]
    fn test_load_descriptor_set_file() {
        let set = FileDescriptorSet {
            file: vec![greeter_file()],
        };
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), set.encode_to_vec()).unwrap();

        let pool = load_descriptor_sets(&[file.path().to_path_buf()]).unwrap();
        assert!(pool.get_service_by_name("gnat.helloworld.Greeter").is_some());
    }

    #[test]
    fn test_missing_descriptor_file() {
        let err = load_descriptor_sets(&[PathBuf::from("/nonexistent/descriptors.bin")])
            .unwrap_err();
        assert!(matches!(err, ProxyError::Io { .. }));
    }

    #[test]
    fn test_corrupt_descriptor_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"\xff\xff\xff").unwrap();

        let err = load_descriptor_sets(&[file.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, ProxyError::Descriptor(_)));
    }
}
