//! End to end tests against a live gRPC upstream
//!
//! A tonic server built on the dynamic codec plays the greeter. The proxy
//! reaches it over a real HTTP/2 connection with descriptors loaded from a
//! descriptor set file.

use std::convert::Infallible;
use std::io::Write;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor, Value as ProtoValue};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
    MethodDescriptorProto, ServiceDescriptorProto,
};
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::codegen::{http, Body as HttpBody, BoxFuture, Context, Poll, Service, StdError};
use tonic::server::{Grpc, NamedService, UnaryService};
use tonic::transport::Server;
use tonic::{Code, Status};
use tower::ServiceExt;

use proxy_lib::rpc::grpc::DynamicCodec;
use proxy_lib::{ClientConf, ProxyBuilder};

fn string_field(name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        json_name: Some(name.to_string()),
        number: Some(1),
        label: Some(Label::Optional as i32),
        r#type: Some(Type::String as i32),
        ..Default::default()
    }
}

fn unary(name: &str) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(".helloworld.HelloRequest".to_string()),
        output_type: Some(".helloworld.HelloReply".to_string()),
        ..Default::default()
    }
}

fn descriptor_set() -> FileDescriptorSet {
    FileDescriptorSet {
        file: vec![FileDescriptorProto {
            name: Some("helloworld.proto".to_string()),
            package: Some("helloworld".to_string()),
            syntax: Some("proto3".to_string()),
            message_type: vec![
                DescriptorProto {
                    name: Some("HelloRequest".to_string()),
                    field: vec![string_field("name")],
                    ..Default::default()
                },
                DescriptorProto {
                    name: Some("HelloReply".to_string()),
                    field: vec![string_field("message")],
                    ..Default::default()
                },
            ],
            service: vec![ServiceDescriptorProto {
                name: Some("Greeter".to_string()),
                method: vec![unary("SayHello"), unary("Sleepy"), unary("ThrowAnErr")],
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

/// Greeter served through the same codec the proxy uses as a client.
#[derive(Clone)]
struct GreeterServer {
    request: MessageDescriptor,
    reply: MessageDescriptor,
}

impl NamedService for GreeterServer {
    const NAME: &'static str = "helloworld.Greeter";
}

impl<B> Service<http::Request<B>> for GreeterServer
where
    B: HttpBody + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::BoxBody>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let handler = GreeterMethod {
            name: req.uri().path().rsplit('/').next().unwrap_or_default().to_string(),
            reply: self.reply.clone(),
        };
        let codec = DynamicCodec::new(self.request.clone());
        Box::pin(async move { Ok(Grpc::new(codec).unary(handler, req).await) })
    }
}

struct GreeterMethod {
    name: String,
    reply: MessageDescriptor,
}

impl UnaryService<DynamicMessage> for GreeterMethod {
    type Response = DynamicMessage;
    type Future = BoxFuture<tonic::Response<DynamicMessage>, Status>;

    fn call(&mut self, request: tonic::Request<DynamicMessage>) -> Self::Future {
        let name = self.name.clone();
        let mut reply = DynamicMessage::new(self.reply.clone());
        let who = request
            .get_ref()
            .get_field_by_name("name")
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        Box::pin(async move {
            match name.as_str() {
                "SayHello" => {
                    let message = ProtoValue::String(format!("Hello {}", who));
                    reply.set_field_by_name("message", message);
                    Ok(tonic::Response::new(reply))
                }
                "Sleepy" => {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    Ok(tonic::Response::new(reply))
                }
                "ThrowAnErr" => Err(Status::with_details(
                    Code::Unknown,
                    "使用了错误的名字",
                    Bytes::from(json!({"code": 20000}).to_string()),
                )),
                _ => Err(Status::unimplemented("Unimplemented")),
            }
        })
    }
}

async fn start_upstream(pool: &DescriptorPool) -> SocketAddr {
    let server = GreeterServer {
        request: pool.get_message_by_name("helloworld.HelloRequest").unwrap(),
        reply: pool.get_message_by_name("helloworld.HelloReply").unwrap(),
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(
        Server::builder()
            .add_service(server)
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );
    addr
}

/// Start the upstream and a proxy in front of it.
async fn proxy() -> Router {
    let set = descriptor_set();
    let pool = DescriptorPool::from_file_descriptor_set(set.clone()).unwrap();
    let addr = start_upstream(&pool).await;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&set.encode_to_vec()).unwrap();

    let conf = ClientConf {
        target: format!("http://{}", addr),
        descriptor_sets: vec![file.path().to_path_buf()],
        ..Default::default()
    };
    ProxyBuilder::new()
        .client_conf(conf)
        .build()
        .await
        .unwrap()
        .into_router()
}

async fn post(router: Router, path: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(format!("/proxy/{}", path))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_say_hello_over_grpc() {
    let router = proxy().await;
    let (status, body) = post(
        router,
        "helloworld.Greeter/sayHello",
        json!({"args": {"name": "Alice"}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": {"message": "Hello Alice"}}));
}

#[tokio::test]
async fn test_custom_code_over_grpc() {
    let router = proxy().await;
    let (status, body) = post(router, "helloworld.Greeter/ThrowAnErr", json!({"args": {}})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], 20000);
    assert_eq!(body["error"]["details"], "使用了错误的名字");
}

#[tokio::test]
async fn test_deadline_against_slow_upstream() {
    let router = proxy().await;
    let deadline = SystemTime::now()
        .checked_add(Duration::from_millis(300))
        .unwrap()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64;

    let (status, body) = post(
        router,
        "helloworld.Greeter/sleepy",
        json!({"args": {"name": "Alice"}, "callOpts": {"deadline": deadline}}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], 4);
    assert_eq!(body["error"]["details"], "Deadline Exceeded");
}
