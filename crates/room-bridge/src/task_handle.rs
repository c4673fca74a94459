// Copyright 2025 The Matrix.org Foundation C.I.C.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

use tokio::task::JoinHandle;
use tracing::{Span, debug};

const PENDING: u8 = 0;
const COMPLETED: u8 = 1;
const CANCELLED: u8 = 2;

/// Decides which of completion and cancellation happened first.
///
/// Both sides race on a single compare-exchange out of the pending state, so
/// only one of them can ever win.
#[derive(Clone, Debug)]
pub(crate) struct CompletionState(Arc<AtomicU8>);

impl CompletionState {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicU8::new(PENDING)))
    }

    /// Claim the right to deliver the outcome.
    ///
    /// Returns `false` if the operation was cancelled first.
    pub(crate) fn try_complete(&self) -> bool {
        self.transition_to(COMPLETED)
    }

    /// Returns `false` if the outcome has already been claimed, or if the
    /// operation was already cancelled.
    fn try_cancel(&self) -> bool {
        self.transition_to(CANCELLED)
    }

    fn transition_to(&self, state: u8) -> bool {
        self.0.compare_exchange(PENDING, state, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire) == CANCELLED
    }
}

/// A handle on an in-flight request.
///
/// It's a thin wrapper around the [`JoinHandle`] of the task waiting for the
/// response. Dropping it doesn't cancel the request, only
/// [`CancellableOperation::cancel`] does.
#[derive(Debug)]
pub struct CancellableOperation {
    handle: JoinHandle<()>,
    state: CompletionState,
    span: Span,
}

impl CancellableOperation {
    pub(crate) fn new(handle: JoinHandle<()>, state: CompletionState, span: Span) -> Self {
        Self { handle, state, span }
    }

    /// Cancel the operation.
    ///
    /// If the outcome hasn't been delivered yet, it never will be. Otherwise,
    /// or if the operation was already cancelled, this does nothing.
    pub fn cancel(&self) {
        let _guard = self.span.enter();

        if self.state.try_cancel() {
            debug!("Cancelling the operation");
            self.handle.abort();
        } else {
            debug!("The operation has already completed or been cancelled, ignoring");
        }
    }

    /// Whether [`CancellableOperation::cancel`] took effect.
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// Whether the task behind this operation is done, either because it
    /// delivered its outcome or because it was cancelled.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
