//! Wire protocol framing and request codec
//!
//! Messages are sequences of fields joined by [`FIELD_SEPARATOR`] and
//! terminated by the [`END_OF_MESSAGE`] sentinel. A single socket read is not
//! guaranteed to deliver a whole message, so both sides accumulate reads until
//! the sentinel appears.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::ProtocolError;

/// Token delimiting fields within a framed message
pub const FIELD_SEPARATOR: &str = "<|s|>";

/// Token marking the end of a framed message
pub const END_OF_MESSAGE: &str = "<|EOM|>";

/// Size of each socket read while accumulating a message
const READ_BUFFER_SIZE: usize = 1024;

/// A decoded control request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Launch a detached process (command code 1)
    Launch {
        executable: String,
        working_directory: String,
        arguments: Vec<String>,
    },
    /// Request cooperative cancellation of a launched process (command code 2)
    Cancel { id: u32 },
    /// Enumerate every process launched in this daemon run (command code 3)
    FetchAll,
    /// Any other or unparseable command code
    Unrecognized,
}

/// Decode a complete message body (sentinel already stripped) into a request.
///
/// The first field is the command code. An unknown or non-numeric code yields
/// [`Request::Unrecognized`] rather than an error; only a recognized command
/// with unusable fields is an error.
pub fn decode_request(message: &str) -> Result<Request, ProtocolError> {
    let fields: Vec<&str> = message.split(FIELD_SEPARATOR).collect();
    let code: i32 = fields[0].trim().parse().unwrap_or(0);

    match code {
        1 => {
            let executable = fields
                .get(1)
                .ok_or(ProtocolError::MissingField {
                    field: "executable",
                })?
                .to_string();
            let working_directory = fields
                .get(2)
                .ok_or(ProtocolError::MissingField {
                    field: "working directory",
                })?
                .to_string();
            let mut arguments: Vec<String> =
                fields[3..].iter().map(|f| f.to_string()).collect();
            // A single trailing empty field is the sender's way of saying
            // "no arguments".
            if arguments.len() == 1 && arguments[0].is_empty() {
                arguments.clear();
            }
            Ok(Request::Launch {
                executable,
                working_directory,
                arguments,
            })
        }
        2 => {
            let raw = fields.get(1).ok_or(ProtocolError::MissingField {
                field: "process id",
            })?;
            let id = raw.trim().parse().map_err(|_| ProtocolError::InvalidId {
                value: raw.to_string(),
            })?;
            Ok(Request::Cancel { id })
        }
        3 => Ok(Request::FetchAll),
        _ => Ok(Request::Unrecognized),
    }
}

/// Encode a request into a message body (no sentinel).
pub fn encode_request(request: &Request) -> String {
    match request {
        Request::Launch {
            executable,
            working_directory,
            arguments,
        } => {
            let mut message = format!(
                "1{sep}{executable}{sep}{working_directory}",
                sep = FIELD_SEPARATOR
            );
            if arguments.is_empty() {
                // Trailing empty field marks "no arguments"
                message.push_str(FIELD_SEPARATOR);
            } else {
                for argument in arguments {
                    message.push_str(FIELD_SEPARATOR);
                    message.push_str(argument);
                }
            }
            message
        }
        Request::Cancel { id } => format!("2{}{}", FIELD_SEPARATOR, id),
        Request::FetchAll => "3".to_string(),
        Request::Unrecognized => "0".to_string(),
    }
}

/// Append the end-of-message sentinel to a message body for transmission.
pub fn frame(body: &str) -> String {
    format!("{}{}", body, END_OF_MESSAGE)
}

/// Return the message body preceding the first sentinel, if one is present.
pub fn strip_frame(buffer: &str) -> Option<&str> {
    buffer.find(END_OF_MESSAGE).map(|idx| &buffer[..idx])
}

/// Read from `reader` until a complete framed message has accumulated, then
/// return its body with the sentinel stripped.
pub async fn read_framed<R>(reader: &mut R) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut message = String::new();
    let mut buffer = [0u8; READ_BUFFER_SIZE];
    loop {
        let received = reader.read(&mut buffer).await?;
        if received == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before the end-of-message sentinel",
            ));
        }
        message.push_str(&String::from_utf8_lossy(&buffer[..received]));
        if let Some(body) = strip_frame(&message) {
            return Ok(body.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn test_decode_launch_with_arguments() {
        let request = decode_request("1<|s|>echo<|s|>/tmp<|s|>hello<|s|>world").unwrap();
        assert_eq!(
            request,
            Request::Launch {
                executable: "echo".to_string(),
                working_directory: "/tmp".to_string(),
                arguments: vec!["hello".to_string(), "world".to_string()],
            }
        );
    }

    #[test]
    fn test_decode_launch_trailing_empty_field_means_no_arguments() {
        let request = decode_request("1<|s|>ls<|s|>/home<|s|>").unwrap();
        assert_eq!(
            request,
            Request::Launch {
                executable: "ls".to_string(),
                working_directory: "/home".to_string(),
                arguments: vec![],
            }
        );
    }

    #[test]
    fn test_decode_launch_missing_working_directory() {
        let result = decode_request("1<|s|>ls");
        assert!(matches!(
            result,
            Err(crate::error::ProtocolError::MissingField {
                field: "working directory"
            })
        ));
    }

    #[test]
    fn test_decode_cancel() {
        let request = decode_request("2<|s|>42").unwrap();
        assert_eq!(request, Request::Cancel { id: 42 });
    }

    #[test]
    fn test_decode_cancel_unparseable_id_is_distinct_error() {
        let result = decode_request("2<|s|>not-a-number");
        assert!(matches!(
            result,
            Err(crate::error::ProtocolError::InvalidId { .. })
        ));
    }

    #[test]
    fn test_decode_cancel_missing_id() {
        let result = decode_request("2");
        assert!(matches!(
            result,
            Err(crate::error::ProtocolError::MissingField {
                field: "process id"
            })
        ));
    }

    #[test]
    fn test_decode_fetch_all() {
        assert_eq!(decode_request("3").unwrap(), Request::FetchAll);
    }

    #[test]
    fn test_decode_unknown_code_is_unrecognized() {
        assert_eq!(decode_request("9").unwrap(), Request::Unrecognized);
        assert_eq!(decode_request("garbage").unwrap(), Request::Unrecognized);
        assert_eq!(decode_request("").unwrap(), Request::Unrecognized);
    }

    #[test]
    fn test_request_round_trip() {
        let requests = vec![
            Request::Launch {
                executable: "python3".to_string(),
                working_directory: "/opt/jobs".to_string(),
                arguments: vec!["job.py".to_string(), "--fast".to_string()],
            },
            Request::Launch {
                executable: "make".to_string(),
                working_directory: "/src".to_string(),
                arguments: vec![],
            },
            Request::Cancel { id: 7 },
            Request::FetchAll,
        ];
        for request in requests {
            let decoded = decode_request(&encode_request(&request)).unwrap();
            assert_eq!(decoded, request);
        }
    }

    #[test]
    fn test_strip_frame() {
        assert_eq!(strip_frame("3<|EOM|>"), Some("3"));
        assert_eq!(strip_frame("<|EOM|>"), Some(""));
        assert_eq!(strip_frame("3<|s|>partial"), None);
    }

    #[tokio::test]
    async fn test_read_framed_across_partial_writes() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            client.write_all(b"1<|s|>echo<|s|>/tmp").await.unwrap();
            client.flush().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            client.write_all(b"<|s|>hi<|EOM|>").await.unwrap();
        });

        let body = read_framed(&mut server).await.unwrap();
        assert_eq!(body, "1<|s|>echo<|s|>/tmp<|s|>hi");
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_read_framed_eof_before_sentinel() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(b"1<|s|>echo").await.unwrap();
        drop(client);

        let result = read_framed(&mut server).await;
        assert!(result.is_err());
    }
}
