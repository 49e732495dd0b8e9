//! SMTP client relaying outgoing mail
//!
//! Speaks the client side of RFC 5321 to a single relay: EHLO, MAIL FROM,
//! one RCPT TO per recipient, DATA, QUIT. TLS and authentication are left to
//! the relay.

use crate::error::{MailError, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, error, info};

/// SMTP client bound to one relay
///
/// # Examples
/// ```no_run
/// use post_office::smtp::SmtpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SmtpClient::new("127.0.0.1:25".to_string(), None);
/// client.send_mail(
///     "sender@example.com",
///     &["recipient@example.com"],
///     b"Subject: Test\r\n\r\nHello!"
/// ).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SmtpClient {
    server_addr: String,
    hello_name: String,
}

impl SmtpClient {
    /// `hello_name` defaults to the local hostname
    pub fn new(server_addr: String, hello_name: Option<String>) -> Self {
        let hello_name = hello_name.unwrap_or_else(|| {
            gethostname::gethostname().to_string_lossy().to_string()
        });

        Self {
            server_addr,
            hello_name,
        }
    }

    pub fn server_addr(&self) -> &str {
        &self.server_addr
    }

    /// Send one message to every recipient in a single transaction
    ///
    /// # Errors
    /// Returns error if the relay cannot be reached or rejects any command.
    pub async fn send_mail(&self, from: &str, recipients: &[&str], data: &[u8]) -> Result<()> {
        if recipients.is_empty() {
            return Err(MailError::InvalidEmail("No recipients".to_string()));
        }

        info!(
            "Relaying mail from {} to {} recipient(s) via {}",
            from,
            recipients.len(),
            self.server_addr
        );

        let stream = TcpStream::connect(&self.server_addr).await.map_err(|e| {
            MailError::Transport(format!("Cannot connect to {}: {}", self.server_addr, e))
        })?;
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        self.read_response(&mut reader, "220").await?;

        self.write_line(&mut writer, &format!("EHLO {}", self.hello_name)).await?;
        self.read_response(&mut reader, "250").await?;

        self.write_line(&mut writer, &format!("MAIL FROM:<{}>", from)).await?;
        self.read_response(&mut reader, "250").await?;

        for recipient in recipients {
            self.write_line(&mut writer, &format!("RCPT TO:<{}>", recipient)).await?;
            self.read_response(&mut reader, "250").await?;
        }

        self.write_line(&mut writer, "DATA").await?;
        self.read_response(&mut reader, "354").await?;

        writer.write_all(&dot_stuff(data)).await?;
        if !data.ends_with(b"\r\n") {
            writer.write_all(b"\r\n").await?;
        }
        writer.write_all(b".\r\n").await?;
        self.read_response(&mut reader, "250").await?;

        self.write_line(&mut writer, "QUIT").await?;
        let _response = self.read_line(&mut reader).await?;

        info!("Mail relayed via {}", self.server_addr);
        Ok(())
    }

    async fn read_line<R>(&self, reader: &mut BufReader<R>) -> Result<String>
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            return Err(MailError::Transport("Connection closed by relay".to_string()));
        }
        Ok(line)
    }

    /// Read a (possibly multi-line) reply and check its code
    async fn read_response<R>(&self, reader: &mut BufReader<R>, expected: &str) -> Result<String>
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        let mut full_response = String::new();

        loop {
            let line = self.read_line(reader).await?;
            debug!("< {}", line.trim());

            full_response.push_str(&line);

            // Last line has a space after the code
            if line.as_bytes().get(3).map_or(true, |b| *b == b' ') {
                break;
            }
        }

        if !full_response.starts_with(expected) {
            error!("Unexpected response: {}", full_response.trim());
            return Err(MailError::SmtpProtocol(format!(
                "Expected {}, got: {}",
                expected,
                full_response.trim()
            )));
        }

        Ok(full_response)
    }

    async fn write_line<W>(&self, writer: &mut W, line: &str) -> Result<()>
    where
        W: tokio::io::AsyncWrite + Unpin,
    {
        debug!("> {}", line);
        writer.write_all(format!("{}\r\n", line).as_bytes()).await?;
        Ok(())
    }
}

/// Double every leading dot (RFC 5321 section 4.5.2)
fn dot_stuff(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 16);
    let mut line_start = true;
    for &byte in data {
        if line_start && byte == b'.' {
            out.push(b'.');
        }
        out.push(byte);
        line_start = byte == b'\n';
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_client_creation() {
        let client = SmtpClient::new("127.0.0.1:2525".to_string(), Some("mailer.local".to_string()));
        assert_eq!(client.server_addr(), "127.0.0.1:2525");
        assert_eq!(client.hello_name, "mailer.local");
    }

    #[test]
    fn test_dot_stuffing() {
        assert_eq!(dot_stuff(b".hidden\r\nok\r\n..two"), b"..hidden\r\nok\r\n...two");
        assert_eq!(dot_stuff(b"a.b"), b"a.b");
    }

    #[tokio::test]
    async fn test_reply_with_non_ascii_after_code() {
        let client = SmtpClient::new("127.0.0.1:2525".to_string(), None);
        let mut reader = BufReader::new("220é relay\r\n220 ready\r\n".as_bytes());

        let response = client.read_response(&mut reader, "220").await.unwrap();
        assert_eq!(response, "220é relay\r\n220 ready\r\n");
    }

    #[tokio::test]
    async fn test_send_to_multiple_recipients() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let relay = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"220 relay ready\r\n").await.unwrap();

            let mut transcript = Vec::new();
            let mut buf = [0u8; 1024];
            let mut in_data = false;
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                transcript.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&transcript).to_string();
                if !text.ends_with("\r\n") {
                    continue;
                }

                if in_data {
                    if text.ends_with("\r\n.\r\n") {
                        in_data = false;
                        socket.write_all(b"250 queued\r\n").await.unwrap();
                    }
                } else if text.ends_with("DATA\r\n") {
                    in_data = true;
                    socket.write_all(b"354 go ahead\r\n").await.unwrap();
                } else if text.ends_with("QUIT\r\n") {
                    socket.write_all(b"221 bye\r\n").await.unwrap();
                    break;
                } else {
                    socket.write_all(b"250-relay\r\n250 OK\r\n").await.unwrap();
                }
            }
            String::from_utf8(transcript).unwrap()
        });

        let client = SmtpClient::new(addr, Some("test.local".to_string()));
        client
            .send_mail(
                "from@example.com",
                &["a@example.com", "b@example.com"],
                b"Subject: Hi\r\n\r\nHello",
            )
            .await
            .unwrap();

        let transcript = relay.await.unwrap();
        assert!(transcript.starts_with("EHLO test.local\r\n"));
        assert!(transcript.contains("RCPT TO:<a@example.com>\r\n"));
        assert!(transcript.contains("RCPT TO:<b@example.com>\r\n"));
        assert!(transcript.contains("Hello\r\n.\r\n"));
    }
}
