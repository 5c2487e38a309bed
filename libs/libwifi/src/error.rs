use nom::Needed;

use crate::frame::components::FrameControl;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The frame control was parsed, but this subtype has no frame struct.
    /// The remaining bytes are kept for callers that want to inspect them.
    #[error("This frame subtype isn't handled: {:?} ({:?})", .0.frame_subtype, .0.frame_type)]
    UnhandledFrameSubtype(FrameControl, Vec<u8>),
    #[error("A parsing failure occurred: \n{}\ndata: {:?}", .0, .1)]
    Failure(String, Vec<u8>),
    #[error("There wasn't enough data. {}", .0)]
    Incomplete(String),
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for Error {
    /// nom errors borrow the input slice, so they are converted into owned
    /// data before leaving the parser.
    fn from(error: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        match error {
            nom::Err::Incomplete(Needed::Size(size)) => {
                Error::Incomplete(format!("At least {size} bytes are missing"))
            }
            nom::Err::Incomplete(Needed::Unknown) => Error::Incomplete(String::new()),
            nom::Err::Failure(error) | nom::Err::Error(error) => Error::Failure(
                format!("nom::ErrorKind is {:?}", error.code),
                error.input.to_vec(),
            ),
        }
    }
}
