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

//! `BytePipe`: a sink/source rendezvous with no buffering. Each
//! write is released by exactly one read. State lives behind one mutex;
//! no I/O happens while it is held — the mutex only guards the state
//! transition, the actual rendezvous is a `tokio::sync::Notify`-driven wait.
//!
//! A conceptual six-state machine {init, writePending, readPending,
//! writeClosed, readClosed, rwClosed} collapses here to four states: a
//! pending write is always represented as `WritePending`, whether or not a
//! reader was already waiting when it arrived — "transfers immediately"
//! just means the writer's `notify_waiters` wakes an already-parked
//! reader on the very next poll instead of requiring a fresh read call.

use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

use crate::buf::Buffer;
use crate::error::{Error, ErrorKind, Result};
use crate::io::sink::ByteSink;
use crate::io::source::ByteSource;

#[derive(Debug)]
enum State {
    Idle,
    WritePending(Buffer),
    WriteErrored(String),
    WriteClosed,
    ReadClosed,
}

struct Shared {
    state: Mutex<State>,
    notify: Notify,
}

/// The write half of a [`BytePipe`].
pub struct PipeSink {
    shared: Arc<Shared>,
}

/// The read half of a [`BytePipe`].
pub struct PipeSource {
    shared: Arc<Shared>,
}

/// Create a linked sink/source pair.
pub fn pipe() -> (PipeSink, PipeSource) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State::Idle),
        notify: Notify::new(),
    });
    (
        PipeSink {
            shared: shared.clone(),
        },
        PipeSource { shared },
    )
}

impl ByteSink for PipeSink {
    async fn write(&mut self, buf: Buffer) -> Result<()> {
        {
            let mut state = self.shared.state.lock().await;
            match &*state {
                State::Idle => *state = State::WritePending(buf),
                State::ReadClosed => {
                    return Err(Error::new(ErrorKind::Protocol, "pipe: source already closed"))
                }
                State::WriteClosed => {
                    return Err(Error::new(ErrorKind::Unexpected, "pipe: sink already closed"))
                }
                State::WritePending(_) | State::WriteErrored(_) => {
                    return Err(Error::new(
                        ErrorKind::Unexpected,
                        "pipe: concurrent write not permitted",
                    ))
                }
            }
        }
        self.shared.notify.notify_waiters();
        self.wait_for_release().await
    }

    async fn error(&mut self, e: Error) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        if !matches!(&*state, State::WriteClosed | State::ReadClosed) {
            *state = State::WriteErrored(e.to_string());
            drop(state);
            self.shared.notify.notify_waiters();
        }
        Ok(())
    }

    /// On a pending write, cancels it, corrupting the stream. On an
    /// idle/parked pipe, marks it closed so the reader next sees `End`.
    async fn close(&mut self) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        match &*state {
            State::ReadClosed | State::WriteClosed => {}
            State::WritePending(_) => {
                *state = State::WriteErrored("pipe: sink closed with a write pending".into());
            }
            State::Idle | State::WriteErrored(_) => {
                *state = State::WriteClosed;
            }
        }
        drop(state);
        self.shared.notify.notify_waiters();
        Ok(())
    }
}

impl PipeSink {
    /// Waits until the reader has taken the pending buffer (state returns
    /// to `Idle`), or the pipe is closed/errored out from under us.
    async fn wait_for_release(&self) -> Result<()> {
        loop {
            {
                let state = self.shared.state.lock().await;
                match &*state {
                    State::WritePending(_) => {}
                    State::Idle => return Ok(()),
                    State::WriteErrored(msg) => return Err(Error::new(ErrorKind::Protocol, msg.clone())),
                    State::ReadClosed => {
                        return Err(Error::new(ErrorKind::Unexpected, "pipe: source closed"))
                    }
                    State::WriteClosed => return Ok(()),
                }
            }
            self.shared.notify.notified().await;
        }
    }
}

impl ByteSource for PipeSource {
    async fn read(&mut self) -> Result<Buffer> {
        loop {
            {
                let mut state = self.shared.state.lock().await;
                match &mut *state {
                    State::WritePending(_) => {
                        let State::WritePending(buf) = std::mem::replace(&mut *state, State::Idle)
                        else {
                            unreachable!()
                        };
                        drop(state);
                        self.shared.notify.notify_waiters();
                        return Ok(buf);
                    }
                    State::WriteErrored(msg) => {
                        let msg = msg.clone();
                        return Err(Error::new(ErrorKind::Protocol, msg));
                    }
                    State::WriteClosed => return Err(Error::end()),
                    State::ReadClosed => {
                        return Err(Error::new(ErrorKind::Unexpected, "pipe: read already closed"))
                    }
                    State::Idle => {}
                }
            }
            self.shared.notify.notified().await;
        }
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.shared.state.lock().await;
        match &*state {
            State::ReadClosed | State::WriteClosed => {}
            State::WritePending(_) => {
                *state = State::WriteErrored("pipe: source closed with a write pending".into());
            }
            State::Idle | State::WriteErrored(_) => {
                *state = State::ReadClosed;
            }
        }
        drop(state);
        self.shared.notify.notify_waiters();
        Ok(())
    }
}
