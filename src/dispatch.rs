//! Presence transitions → remote commands.
//!
//! # Responsibilities
//! - Subscribe to a detector's `PresenceChanged` events
//! - Map On/Off to the configured request fields
//! - Send through the shared call channel and log the reply

use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::{ActivityConfig, DispatchConfig};
use crate::presence::{EventKind, PresenceDetector, PresenceState, SubscriptionId};
use crate::rpc::channel::complete_call;
use crate::rpc::message::{encode, RequestFields, RpcRequest};
use crate::rpc::{CallChannel, Transport};

/// Owns the call channel and turns presence events into calls.
pub struct Dispatcher<T: Transport> {
    channel: CallChannel<T>,
    device: String,
    config: DispatchConfig,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(channel: CallChannel<T>, device: impl Into<String>, config: DispatchConfig) -> Self {
        Self {
            channel,
            device: device.into(),
            config,
        }
    }

    pub fn channel(&self) -> &CallChannel<T> {
        &self.channel
    }

    /// Subscribe to `detector`; every confirmed transition triggers a dispatch.
    ///
    /// Calls are spawned on the current Tokio runtime. Transitions fed from a
    /// thread without one are logged and dropped.
    pub fn attach(self: &Arc<Self>, detector: &PresenceDetector) -> SubscriptionId {
        let dispatcher = Arc::clone(self);
        detector.subscribe(EventKind::PresenceChanged, move |state| {
            dispatcher.dispatch(state);
        })
    }

    /// Request sent for `state`, if any.
    pub fn request_for(&self, state: PresenceState) -> Option<RpcRequest> {
        let activity = match state {
            PresenceState::On => &self.config.on,
            PresenceState::Off => &self.config.off,
            PresenceState::Unknown => return None,
        };
        Some(encode(fields(activity)))
    }

    /// Send the command for `state`. Returns the call's task handle, or `None`
    /// when nothing was sent.
    pub fn dispatch(&self, state: PresenceState) -> Option<JoinHandle<()>> {
        tracing::info!(device = %self.device, status = %state, "Device is now {}", state);

        let Some(request) = self.request_for(state) else {
            tracing::error!(device = %self.device, "Device changed to unknown status");
            return None;
        };

        if Handle::try_current().is_err() {
            tracing::error!(device = %self.device, status = %state, "No async runtime, command not sent");
            return None;
        }

        tracing::info!(
            activity = ?request.content.activity,
            location = %request.content.location,
            queue = %self.config.queue,
            "Invoking activity"
        );

        let channel = self.channel.clone();
        let device = self.device.clone();
        let handle = self.channel.send(
            request,
            &self.config.queue,
            Some(Box::new(move |result| {
                let outcome = complete_call(&channel, result);
                tracing::debug!(device = %device, status = %state, outcome = ?outcome, "Dispatch completed");
            })),
        );
        Some(handle)
    }
}

fn fields(activity: &ActivityConfig) -> RequestFields {
    RequestFields {
        activity: activity.activity.clone(),
        location: activity.location.clone(),
        device: activity.device.clone(),
        command: activity.command.clone(),
    }
}
