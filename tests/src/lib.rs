//! Integration scenarios that drive the sweep engine end to end over a
//! simulated transport, plus a privileged smoke test over a real socket.

#[cfg(test)]
mod discovery;
