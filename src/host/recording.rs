use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{HostCall, HostPort};
use crate::error::HostError;
use crate::policy::{KeyboardPolicy, PointerPolicy, PropagationMode};

/// One call as the host received it.
#[derive(Debug, Clone, PartialEq)]
pub enum HostRequest {
    SetKeyboardPolicy(Vec<KeyboardPolicy>),
    SetPointerPolicy(Vec<PointerPolicy>),
    SetKeyboardMode(PropagationMode),
    SetPointerMode(PropagationMode),
    GetKeyboardMode,
}

impl HostRequest {
    pub fn call(&self) -> HostCall {
        match self {
            HostRequest::SetKeyboardPolicy(_) => HostCall::SetKeyboardPolicy,
            HostRequest::SetPointerPolicy(_) => HostCall::SetPointerPolicy,
            HostRequest::SetKeyboardMode(_) => HostCall::SetKeyboardMode,
            HostRequest::SetPointerMode(_) => HostCall::SetPointerMode,
            HostRequest::GetKeyboardMode => HostCall::GetKeyboardMode,
        }
    }
}

#[derive(Debug)]
struct Inner {
    log: Vec<HostRequest>,
    failures: VecDeque<(HostCall, HostError)>,
    latency: Option<Duration>,
    keyboard: Vec<KeyboardPolicy>,
    pointer: Vec<PointerPolicy>,
    keyboard_mode: PropagationMode,
    pointer_mode: PropagationMode,
}

/// In-process stand-in for the host.
///
/// Keeps what a real host would hold (installed lists and modes), logs every
/// request, and can be told to reject upcoming calls. Clones share state.
#[derive(Debug, Clone)]
pub struct RecordingHost {
    inner: Arc<Mutex<Inner>>,
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                log: Vec::new(),
                failures: VecDeque::new(),
                latency: None,
                keyboard: Vec::new(),
                pointer: Vec::new(),
                keyboard_mode: PropagationMode::Focus,
                pointer_mode: PropagationMode::Alpha,
            })),
        }
    }

    /// Every call sleeps this long before answering.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = Some(latency);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // a panicking test thread must not hide the log from the next assertion
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The next call to `call` is rejected with `error`. Queued failures are
    /// consumed in order, each by the first matching call.
    pub fn fail_next(&self, call: HostCall, error: HostError) {
        self.lock().failures.push_back((call, error));
    }

    pub fn requests(&self) -> Vec<HostRequest> {
        self.lock().log.clone()
    }

    pub fn clear_requests(&self) {
        self.lock().log.clear();
    }

    pub fn count(&self, call: HostCall) -> usize {
        self.lock().log.iter().filter(|r| r.call() == call).count()
    }

    pub fn keyboard_policies(&self) -> Vec<KeyboardPolicy> {
        self.lock().keyboard.clone()
    }

    pub fn pointer_policies(&self) -> Vec<PointerPolicy> {
        self.lock().pointer.clone()
    }

    pub fn keyboard_mode_now(&self) -> PropagationMode {
        self.lock().keyboard_mode
    }

    pub fn pointer_mode_now(&self) -> PropagationMode {
        self.lock().pointer_mode
    }

    /// Logs the request, then either applies it or returns the queued failure.
    async fn handle<F>(&self, request: HostRequest, apply: F) -> Result<(), HostError>
    where
        F: FnOnce(&mut Inner),
    {
        let call = request.call();
        let latency = {
            let mut inner = self.lock();
            inner.log.push(request);
            inner.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut inner = self.lock();
        if let Some(pos) = inner.failures.iter().position(|(c, _)| *c == call)
            && let Some((_, err)) = inner.failures.remove(pos)
        {
            return Err(err);
        }
        apply(&mut inner);
        Ok(())
    }
}

#[async_trait]
impl HostPort for RecordingHost {
    async fn set_keyboard_policy(&self, policies: Vec<KeyboardPolicy>) -> Result<(), HostError> {
        let request = HostRequest::SetKeyboardPolicy(policies.clone());
        self.handle(request, move |inner| inner.keyboard = policies).await
    }

    async fn set_pointer_policy(&self, policies: Vec<PointerPolicy>) -> Result<(), HostError> {
        let request = HostRequest::SetPointerPolicy(policies.clone());
        self.handle(request, move |inner| inner.pointer = policies).await
    }

    async fn set_keyboard_mode(&self, mode: PropagationMode) -> Result<(), HostError> {
        self.handle(HostRequest::SetKeyboardMode(mode), move |inner| {
            inner.keyboard_mode = mode
        })
        .await
    }

    async fn set_pointer_mode(&self, mode: PropagationMode) -> Result<(), HostError> {
        self.handle(HostRequest::SetPointerMode(mode), move |inner| {
            inner.pointer_mode = mode
        })
        .await
    }

    async fn keyboard_mode(&self) -> Result<PropagationMode, HostError> {
        self.handle(HostRequest::GetKeyboardMode, |_| {}).await?;
        Ok(self.keyboard_mode_now())
    }
}
