//! Action handlers: UpdateAction dispatch and background task spawning

use std::sync::Arc;

use droidlaunch_core::prelude::*;
use droidlaunch_daemon::{
    Adb, AppMetadata, CommandRunner, DaemonOptions, ExecutableLocator, MirrorTarget, Tool,
};
use tokio::sync::mpsc;

use crate::handler::UpdateAction;
use crate::message::Message;
use crate::mirror::MirrorSessionManager;
use crate::state::RequestId;

/// Shared dependencies of every background action
#[derive(Debug)]
pub struct ActionContext<R> {
    pub runner: Arc<R>,
    pub locator: Arc<ExecutableLocator>,
    pub metadata: Arc<AppMetadata>,
    pub daemon: DaemonOptions,
    pub mirror: Arc<MirrorSessionManager>,
}

impl<R: CommandRunner + Send + Sync + 'static> ActionContext<R> {
    /// `adb` at its cached location, discovering it if needed
    pub fn adb(&self) -> Result<Adb<R>> {
        let path = self.locator.resolve(Tool::Adb)?;
        Ok(Adb::new(path, Arc::clone(&self.runner)))
    }
}

/// Execute an action, spawning a background task where it does I/O
pub fn handle_action<R>(
    action: UpdateAction,
    ctx: &Arc<ActionContext<R>>,
    msg_tx: mpsc::UnboundedSender<Message>,
) where
    R: CommandRunner + Send + Sync + 'static,
{
    match action {
        UpdateAction::DiscoverDevices { request_id } => {
            spawn_device_discovery(request_id, Arc::clone(ctx), msg_tx);
        }

        UpdateAction::FetchApps {
            request_id,
            device_id,
        } => {
            spawn_app_fetch(request_id, device_id, Arc::clone(ctx), msg_tx);
        }

        UpdateAction::StartMirror { device_id, target } => {
            spawn_mirror_launch(device_id, target, Arc::clone(ctx), msg_tx);
        }

        UpdateAction::StopMirror { device_id } => {
            ctx.mirror.stop(&device_id);
        }
    }
}

/// locate adb → start-server → devices -l, short-circuiting on the first failure
fn spawn_device_discovery<R>(
    request_id: RequestId,
    ctx: Arc<ActionContext<R>>,
    msg_tx: mpsc::UnboundedSender<Message>,
) where
    R: CommandRunner + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let result = discover_devices(&ctx).await.map_err(|e| e.user_message());
        let _ = msg_tx.send(Message::DevicesLoaded { request_id, result });
    });
}

async fn discover_devices<R>(ctx: &ActionContext<R>) -> Result<Vec<droidlaunch_core::Device>>
where
    R: CommandRunner + Send + Sync + 'static,
{
    // Always rediscover: the user may have installed adb since the last refresh
    let path = ctx.locator.discover(Tool::Adb)?;
    let adb = Adb::new(path, Arc::clone(&ctx.runner));
    adb.ensure_running(ctx.daemon).await?;
    adb.list_devices().await
}

fn spawn_app_fetch<R>(
    request_id: RequestId,
    device_id: String,
    ctx: Arc<ActionContext<R>>,
    msg_tx: mpsc::UnboundedSender<Message>,
) where
    R: CommandRunner + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let result = match ctx.adb() {
            Ok(adb) => adb.list_packages(&device_id, &ctx.metadata).await,
            Err(e) => Err(e),
        }
        .map_err(|e| e.user_message());

        let _ = msg_tx.send(Message::AppsLoaded {
            request_id,
            device_id,
            result,
        });
    });
}

/// Discovery and fork/exec block, so the launch runs off the catalog loop.
///
/// The launch result is queued before the session's watcher starts, so the
/// loop sees it ahead of any output or exit from that session.
fn spawn_mirror_launch<R>(
    device_id: String,
    target: MirrorTarget,
    ctx: Arc<ActionContext<R>>,
    msg_tx: mpsc::UnboundedSender<Message>,
) where
    R: CommandRunner + Send + Sync + 'static,
{
    tokio::task::spawn_blocking(move || {
        let launched_device = device_id.clone();
        let launched_target = target.clone();
        let _ = ctx.mirror.start_with(&device_id, target, move |result| {
            let _ = msg_tx.send(Message::MirrorLaunched {
                device_id: launched_device,
                target: launched_target,
                result: result.as_ref().copied().map_err(|e| e.user_message()),
            });
        });
    });
}
