//! YAPP/YappC block file transfer, layered as a sub-conversation inside
//! an already-connected link (an AX.25 I-frame stream, or any other
//! reliable byte pipe the caller provides).

mod error;
mod io;
mod packet;
mod receiver;
mod sender;

pub use error::YappError;
pub use io::{FileSink, FileSource, FsSink, FsSource};
pub use packet::{DosDateTime, Packet};
pub use receiver::{IncomingFile, ReceiverOutcome, YappReceiver};
pub use sender::{SenderOutcome, YappSender};
