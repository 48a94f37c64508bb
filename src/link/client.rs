use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

use log::{debug, info, warn};

use super::protocol::{ControllerCommand, Report, Request, Response, NEUTRAL_REPORT};
use super::LinkError;

/// Anything that can put a controller state on the device.
///
/// Every call either delivers the command or fails; nothing is dropped.
pub trait ControllerSink: Send {
    fn send(&mut self, command: &ControllerCommand) -> Result<(), LinkError>;
}

/// Automation-side connection to a device endpoint.
///
/// The stream is owned for the client's lifetime. Dropping the client closes
/// the connection without sending STOP.
pub struct LinkClient<T: Read + Write> {
    stream: T,
    last_sticky: Report,
    scratch: Vec<u8>,
}

impl LinkClient<TcpStream> {
    pub fn connect_tcp(addr: impl ToSocketAddrs) -> Result<Self, LinkError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Self::connect(stream)
    }
}

impl<T: Read + Write> LinkClient<T> {
    /// Blocks until the endpoint reports the device as enabled.
    pub fn connect(mut stream: T) -> Result<Self, LinkError> {
        debug!("waiting for device endpoint to enable");
        match read_response(&mut stream)? {
            Response::HostEnabled => {}
            other => {
                return Err(LinkError::UnexpectedResponse {
                    expected: "HOST_ENABLED",
                    got: other.as_u8(),
                })
            }
        }
        info!("controller link ready");
        Ok(Self {
            stream,
            last_sticky: NEUTRAL_REPORT,
            scratch: Vec::with_capacity(16),
        })
    }

    /// Sends one request and waits for its acknowledgement, riding out any
    /// human override in between.
    pub fn request(&mut self, request: &Request) -> Result<(), LinkError> {
        self.scratch.clear();
        request.encode(&mut self.scratch);
        loop {
            self.stream.write_all(&self.scratch)?;
            self.stream.flush()?;
            match read_response(&mut self.stream)? {
                Response::Ack => return Ok(()),
                Response::UserOverride => {
                    warn!("human override active, holding automated input");
                    match read_response(&mut self.stream)? {
                        Response::HostEnabled => {
                            info!("human override released, resending");
                        }
                        other => {
                            return Err(LinkError::UnexpectedResponse {
                                expected: "HOST_ENABLED",
                                got: other.as_u8(),
                            })
                        }
                    }
                }
                Response::UnknownError => return Err(LinkError::Device),
                other => {
                    return Err(LinkError::UnexpectedResponse {
                        expected: "ACK",
                        got: other.as_u8(),
                    })
                }
            }
        }
    }

    /// Asks the endpoint to shut down and consumes the client.
    pub fn stop(mut self) -> Result<(), LinkError> {
        self.scratch.clear();
        Request::Stop.encode(&mut self.scratch);
        self.stream.write_all(&self.scratch)?;
        self.stream.flush()?;
        match read_response(&mut self.stream) {
            Ok(Response::Ack) | Err(LinkError::Closed) => Ok(()),
            Ok(other) => Err(LinkError::UnexpectedResponse {
                expected: "ACK",
                got: other.as_u8(),
            }),
            Err(err) => Err(err),
        }
    }

    pub fn into_inner(self) -> T {
        self.stream
    }
}

impl<T: Read + Write + Send> ControllerSink for LinkClient<T> {
    /// Timed commands are sent as a counted report followed by the last
    /// sticky state, so the device falls back to it once the hold ends.
    fn send(&mut self, command: &ControllerCommand) -> Result<(), LinkError> {
        let request = command.to_request();
        match request {
            Request::UpdateReportNTimes(..) => {
                self.request(&request)?;
                let sticky = self.last_sticky;
                self.request(&Request::UpdateReport(sticky))
            }
            Request::UpdateReport(report) => {
                self.last_sticky = report;
                self.request(&request)
            }
            Request::Stop => self.request(&request),
        }
    }
}

fn read_response<R: Read>(stream: &mut R) -> Result<Response, LinkError> {
    let mut byte = [0u8; 1];
    stream.read_exact(&mut byte).map_err(|err| match err.kind() {
        std::io::ErrorKind::UnexpectedEof => LinkError::Closed,
        _ => LinkError::Io(err),
    })?;
    Response::from_byte(byte[0]).ok_or(LinkError::UnexpectedResponse {
        expected: "a response code",
        got: byte[0],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::protocol::Buttons;
    use std::io::Cursor;
    use std::time::Duration;

    /// Scripted peer: reads come from `responses`, writes are captured.
    struct Scripted {
        responses: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl Scripted {
        fn new(responses: &[u8]) -> Self {
            Self {
                responses: Cursor::new(responses.to_vec()),
                written: Vec::new(),
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.responses.read(buf)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn connect_requires_host_enabled() {
        let err = LinkClient::connect(Scripted::new(&[0x01])).err().unwrap();
        assert!(matches!(err, LinkError::UnexpectedResponse { got: 0x01, .. }));
        assert!(LinkClient::connect(Scripted::new(&[])).is_err());
    }

    #[test]
    fn override_resends_same_request() {
        // HOST_ENABLED, then USER_OVERRIDE, HOST_ENABLED, ACK
        let mut client = LinkClient::connect(Scripted::new(&[0x00, 0x03, 0x00, 0x01])).unwrap();
        let cmd = ControllerCommand::neutral().press(Buttons::A);
        client.send(&cmd).unwrap();

        let written = client.into_inner().written;
        assert_eq!(written.len(), 18);
        assert_eq!(written[..9], written[9..]);
        assert_eq!(written[0], 0x00);
        assert_eq!(written[1], 0x04);
    }

    #[test]
    fn timed_command_restores_sticky_state() {
        let mut client = LinkClient::connect(Scripted::new(&[0x00, 0x01, 0x01])).unwrap();
        let cmd = ControllerCommand::neutral()
            .press(Buttons::X)
            .hold(Duration::from_millis(16));
        client.send(&cmd).unwrap();

        let written = client.into_inner().written;
        assert_eq!(written.len(), 11 + 9);
        assert_eq!(written[0], 0x01);
        assert_eq!(&written[9..11], &[2, 0]);
        assert_eq!(written[11], 0x00);
        assert_eq!(&written[12..20], &NEUTRAL_REPORT);
    }

    #[test]
    fn protocol_violations_are_fatal() {
        let mut client = LinkClient::connect(Scripted::new(&[0x00, 0x02])).unwrap();
        let err = client.send(&ControllerCommand::neutral()).unwrap_err();
        assert!(matches!(err, LinkError::UnexpectedResponse { got: 0x02, .. }));

        let mut client = LinkClient::connect(Scripted::new(&[0x00])).unwrap();
        let err = client.send(&ControllerCommand::neutral()).unwrap_err();
        assert!(matches!(err, LinkError::Closed));
    }
}
