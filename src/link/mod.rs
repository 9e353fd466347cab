//! Links to the external collaborators
//!
//! - Operator app: framed envelopes over TCP or Bluetooth RFCOMM
//! - Motor board: newline-terminated tokens over serial or TCP
//!
//! Each link is shared between the worker that reads it and the component
//! that writes to it.

pub mod actuator;
pub mod operator;
#[cfg(feature = "bluetooth")]
pub mod rfcomm;
pub mod tcp;
pub mod traits;

pub use actuator::{ActuatorEvent, LineActuatorLink};
pub use operator::StreamOperatorLink;
pub use traits::{ActuatorLink, OperatorLink};
