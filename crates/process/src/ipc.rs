//! Control-connection server for the binding process.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

use tether_proto::{
	ErrorCode, Event, IpcFrame, RendererId, RequestPayload, Response, ResponsePayload, read_frame,
	write_frame,
};

use crate::context::ProcessContext;

/// Starts the binding-process control server on a Unix domain socket.
///
/// Each browser host gets one connection; per-renderer channels multiplex
/// over it. On shutdown, every connection receives a
/// [`Event::ShuttingDown`] broadcast before the listener stops.
///
/// # Errors
///
/// Returns an error if the socket cannot be bound or if filesystem
/// operations on the socket path fail.
pub async fn serve(
	socket_path: impl AsRef<Path>,
	ctx: Arc<ProcessContext>,
	shutdown: CancellationToken,
) -> std::io::Result<()> {
	let path = socket_path.as_ref();
	if path.exists() {
		tokio::fs::remove_file(path).await?;
	}

	let listener = UnixListener::bind(path)?;
	tracing::info!(path = %path.display(), "binding process listening");

	loop {
		tokio::select! {
			_ = shutdown.cancelled() => {
				tracing::info!("binding process shutting down");
				break;
			}
			res = listener.accept() => {
				match res {
					Ok((stream, _addr)) => {
						tokio::spawn(handle_connection(stream, ctx.clone(), shutdown.clone()));
					}
					Err(error) => {
						tracing::error!(%error, "failed to accept control connection");
					}
				}
			}
		}
	}

	Ok(())
}

/// Handles one browser host's control connection.
///
/// Channels opened on this connection are torn down when it drops; the
/// browser side schedules the delayed process release.
pub async fn handle_connection(
	stream: UnixStream,
	ctx: Arc<ProcessContext>,
	shutdown: CancellationToken,
) {
	tracing::info!("new control connection");

	let (mut reader, mut writer) = stream.into_split();
	let mut opened: Vec<RendererId> = Vec::new();

	loop {
		tokio::select! {
			_ = shutdown.cancelled() => {
				let _ = write_frame(&mut writer, &IpcFrame::Event(Event::ShuttingDown)).await;
				break;
			}
			frame = read_frame(&mut reader) => {
				match frame {
					Ok(IpcFrame::Request(req)) => {
						let response = match dispatch(&ctx, req.payload, &mut opened) {
							Ok(payload) => Response {
								request_id: req.id,
								payload: Some(payload),
								error: None,
							},
							Err(error) => Response {
								request_id: req.id,
								payload: None,
								error: Some(error),
							},
						};
						if write_frame(&mut writer, &IpcFrame::Response(response)).await.is_err() {
							break;
						}
					}
					Ok(frame) => {
						tracing::warn!(?frame, "unexpected frame from browser");
					}
					Err(error) if error.kind() == ErrorKind::UnexpectedEof => break,
					Err(error) => {
						tracing::error!(%error, "control connection error");
						break;
					}
				}
			}
		}
	}

	for renderer in opened {
		ctx.close_channel(renderer);
	}
	tracing::info!("control connection closed");
}

fn dispatch(
	ctx: &ProcessContext,
	payload: RequestPayload,
	opened: &mut Vec<RendererId>,
) -> Result<ResponsePayload, ErrorCode> {
	match payload {
		RequestPayload::Ping => Ok(ResponsePayload::Pong),
		RequestPayload::OpenChannel {
			renderer_id,
			url,
			features,
		} => {
			let (_channel, handle) = ctx.open_channel(renderer_id, url, features);
			if !opened.contains(&renderer_id) {
				opened.push(renderer_id);
			}
			Ok(ResponsePayload::ChannelOpened {
				handle: Some(handle),
			})
		}
		RequestPayload::GenerateRouteId => Ok(ResponsePayload::RouteId {
			id: ctx.next_route_id(),
		}),
		RequestPayload::BindApis {
			renderer_id,
			features,
		} => {
			let channel = ctx.channel(renderer_id).ok_or(ErrorCode::UnknownRenderer)?;
			let failed = channel.bind_apis(ctx.registry(), &features);
			Ok(ResponsePayload::ApisBound { failed })
		}
	}
}

#[cfg(test)]
mod tests {
	use tether_proto::{ChannelHandle, Request, RequestId, RouteId};
	use tether_provider::{FeatureEntry, Provider, StaticModule};
	use tether_registry::{Registry, RegistryConfig};
	use tether_script::ScriptObject;

	use super::*;

	fn test_context() -> Arc<ProcessContext> {
		let mut registry = Registry::new(RegistryConfig {
			search_dirs: Vec::new(),
			cache_path: None,
		});
		registry.add_provider(Arc::new(Provider::new(Arc::new(StaticModule::new(
			vec![FeatureEntry::new("app.echo", "app.echo")],
			Box::new(|_, _| Some(ScriptObject::new())),
		)))));
		Arc::new(ProcessContext::new(Arc::new(registry)))
	}

	async fn send(stream: &mut UnixStream, id: u64, payload: RequestPayload) {
		write_frame(
			stream,
			&IpcFrame::Request(Request {
				id: RequestId(id),
				payload,
			}),
		)
		.await
		.unwrap();
	}

	async fn recv_response(stream: &mut UnixStream) -> Response {
		match read_frame(stream).await.unwrap() {
			IpcFrame::Response(resp) => resp,
			frame => panic!("expected response, got {frame:?}"),
		}
	}

	#[tokio::test]
	async fn ping_roundtrip() {
		let ctx = test_context();
		let (mut client, server) = UnixStream::pair().unwrap();
		let token = CancellationToken::new();
		let server_task = tokio::spawn(handle_connection(server, ctx, token));

		send(&mut client, 1, RequestPayload::Ping).await;
		let resp = recv_response(&mut client).await;
		assert_eq!(resp.request_id, RequestId(1));
		assert!(matches!(resp.payload, Some(ResponsePayload::Pong)));
		assert!(resp.error.is_none());

		drop(client);
		server_task.await.unwrap();
	}

	#[tokio::test]
	async fn open_channel_then_bind() {
		let ctx = test_context();
		let (mut client, server) = UnixStream::pair().unwrap();
		let token = CancellationToken::new();
		let server_task = tokio::spawn(handle_connection(server, ctx.clone(), token));

		send(
			&mut client,
			1,
			RequestPayload::OpenChannel {
				renderer_id: RendererId(4),
				url: Some("https://example.com/".to_string()),
				features: vec!["app.echo".to_string()],
			},
		)
		.await;
		let resp = recv_response(&mut client).await;
		let Some(ResponsePayload::ChannelOpened { handle: Some(handle) }) = resp.payload else {
			panic!("expected channel handle");
		};
		assert_eq!(
			handle,
			ChannelHandle {
				key: ProcessContext::channel_key(RendererId(4)),
			}
		);

		send(
			&mut client,
			2,
			RequestPayload::BindApis {
				renderer_id: RendererId(4),
				features: vec!["app.echo".to_string(), "app.missing".to_string()],
			},
		)
		.await;
		let resp = recv_response(&mut client).await;
		let Some(ResponsePayload::ApisBound { failed }) = resp.payload else {
			panic!("expected bind result");
		};
		assert_eq!(failed, ["app.missing"]);

		let channel = ctx.channel(RendererId(4)).unwrap();
		assert!(channel.root().get("app").unwrap().get("echo").is_some());

		drop(client);
		server_task.await.unwrap();
	}

	#[tokio::test]
	async fn bind_without_channel_is_rejected() {
		let ctx = test_context();
		let (mut client, server) = UnixStream::pair().unwrap();
		let token = CancellationToken::new();
		let server_task = tokio::spawn(handle_connection(server, ctx, token));

		send(
			&mut client,
			1,
			RequestPayload::BindApis {
				renderer_id: RendererId(9),
				features: vec!["app.echo".to_string()],
			},
		)
		.await;
		let resp = recv_response(&mut client).await;
		assert!(resp.payload.is_none());
		assert_eq!(resp.error, Some(ErrorCode::UnknownRenderer));

		drop(client);
		server_task.await.unwrap();
	}

	#[tokio::test]
	async fn route_ids_allocated_from_two() {
		let ctx = test_context();
		let (mut client, server) = UnixStream::pair().unwrap();
		let token = CancellationToken::new();
		let server_task = tokio::spawn(handle_connection(server, ctx, token));

		for expected in [2u64, 3, 4] {
			send(&mut client, expected, RequestPayload::GenerateRouteId).await;
			let resp = recv_response(&mut client).await;
			assert!(matches!(
				resp.payload,
				Some(ResponsePayload::RouteId { id }) if id == RouteId(expected)
			));
		}

		drop(client);
		server_task.await.unwrap();
	}

	#[tokio::test]
	async fn disconnect_closes_channels() {
		let ctx = test_context();
		let (mut client, server) = UnixStream::pair().unwrap();
		let token = CancellationToken::new();
		let server_task = tokio::spawn(handle_connection(server, ctx.clone(), token));

		send(
			&mut client,
			1,
			RequestPayload::OpenChannel {
				renderer_id: RendererId(1),
				url: None,
				features: vec![],
			},
		)
		.await;
		recv_response(&mut client).await;
		assert_eq!(ctx.channel_count(), 1);

		drop(client);
		server_task.await.unwrap();
		assert_eq!(ctx.channel_count(), 0);
	}

	#[tokio::test]
	async fn shutdown_broadcasts_event() {
		let ctx = test_context();
		let (mut client, server) = UnixStream::pair().unwrap();
		let token = CancellationToken::new();
		let server_task = tokio::spawn(handle_connection(server, ctx, token.clone()));

		token.cancel();
		let frame = read_frame(&mut client).await.unwrap();
		assert!(matches!(frame, IpcFrame::Event(Event::ShuttingDown)));

		server_task.await.unwrap();
	}
}
