//! Handset application payloads carried over the link.
//!
//! | Module         | Direction          | Packet kind           |
//! |----------------|--------------------|-----------------------|
//! | `control`      | handset → receiver | `RemoteControl`       |
//! | `control_loop` | handset → receiver | `RemoteControl`       |
//! | `feedback`     | receiver → handset | `ReceiverMessageBox`  |

pub mod control;
pub mod control_loop;
pub mod feedback;
