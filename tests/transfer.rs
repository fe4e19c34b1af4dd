use std::fs;
use std::io::{ErrorKind, Read};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::thread::{self, JoinHandle};

use ftplite::broker::{self, Advertisement};
use ftplite::error::ProtocolError;
use ftplite::frame;
use ftplite::{Client, ClientConfig, Download, Error, Server, ServerConfig};

const BUF: usize = 1024;

/// Start a server on an ephemeral port serving `root`.
fn start_server(root: &Path) -> (SocketAddr, JoinHandle<ftplite::Result<()>>) {
    let config = ServerConfig {
        host: Ipv4Addr::LOCALHOST,
        port: 0,
        root: root.to_path_buf(),
        program_name: "ftplite-server".to_string(),
        ..Default::default()
    };
    let server = Server::bind(config).unwrap();
    let addr = server.local_addr().unwrap();
    let handle = thread::spawn(move || server.run());
    (addr, handle)
}

fn client_for(addr: SocketAddr, local_dir: &Path) -> Client {
    let mut config = ClientConfig::new(Ipv4Addr::LOCALHOST, addr.port());
    config.local_dir = local_dir.to_path_buf();
    Client::connect(config).unwrap()
}

fn request(control: &mut TcpStream, line: &str) -> String {
    frame::send_text(control, line).unwrap();
    frame::receive_text(control, BUF).unwrap()
}

#[test]
fn put_then_get_round_trip() {
    let srv = tempfile::tempdir().unwrap();
    let cli = tempfile::tempdir().unwrap();
    fs::write(cli.path().join("myfile.txt"), "hello world").unwrap();

    let (addr, server) = start_server(srv.path());
    let mut client = client_for(addr, cli.path());

    assert_eq!(client.put("myfile.txt").unwrap(), 11);
    assert_eq!(
        fs::read_to_string(srv.path().join("myfile.txt")).unwrap(),
        "hello world"
    );

    let dest = cli.path().join("copy.txt");
    match client.get_as("myfile.txt", &dest).unwrap() {
        Download::Saved { path, bytes } => {
            assert_eq!(path, dest);
            assert_eq!(bytes, 11);
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(fs::read_to_string(&dest).unwrap(), "hello world");

    client.quit().unwrap();
    server.join().unwrap().unwrap();
}

#[test]
fn put_overwrites_existing_file() {
    let srv = tempfile::tempdir().unwrap();
    let cli = tempfile::tempdir().unwrap();
    fs::write(srv.path().join("notes.txt"), "stale content that is longer").unwrap();

    let (addr, server) = start_server(srv.path());
    let mut client = client_for(addr, cli.path());

    fs::write(cli.path().join("notes.txt"), "first").unwrap();
    client.put("notes.txt").unwrap();
    fs::write(cli.path().join("notes.txt"), "second").unwrap();
    client.put("notes.txt").unwrap();

    assert_eq!(fs::read_to_string(srv.path().join("notes.txt")).unwrap(), "second");

    client.quit().unwrap();
    server.join().unwrap().unwrap();
}

#[test]
fn binary_and_empty_files() {
    let srv = tempfile::tempdir().unwrap();
    let cli = tempfile::tempdir().unwrap();
    let blob: Vec<u8> = (0..=255u8).cycle().take(300_000).collect();
    fs::write(cli.path().join("blob.bin"), &blob).unwrap();
    fs::write(cli.path().join("empty"), b"").unwrap();

    let (addr, server) = start_server(srv.path());
    let mut client = client_for(addr, cli.path());

    client.put("blob.bin").unwrap();
    client.put("empty").unwrap();
    assert_eq!(fs::read(srv.path().join("blob.bin")).unwrap(), blob);
    assert!(fs::read(srv.path().join("empty")).unwrap().is_empty());

    fs::remove_file(cli.path().join("blob.bin")).unwrap();
    client.get("blob.bin").unwrap();
    assert_eq!(fs::read(cli.path().join("blob.bin")).unwrap(), blob);

    client.quit().unwrap();
    server.join().unwrap().unwrap();
}

#[test]
fn get_missing_file_reports_not_found() {
    let srv = tempfile::tempdir().unwrap();
    let cli = tempfile::tempdir().unwrap();
    fs::write(srv.path().join("present.txt"), "x").unwrap();

    let (addr, server) = start_server(srv.path());
    let mut client = client_for(addr, cli.path());

    assert_eq!(client.get("absent.txt").unwrap(), Download::NotFound);
    assert!(!cli.path().join("absent.txt").exists());

    // session is still in step
    assert_eq!(client.ls().unwrap(), "present.txt");

    client.quit().unwrap();
    server.join().unwrap().unwrap();
}

#[test]
fn get_missing_file_opens_no_data_phase() {
    let srv = tempfile::tempdir().unwrap();
    let (addr, server) = start_server(srv.path());
    let mut control = TcpStream::connect(addr).unwrap();

    assert_eq!(request(&mut control, "get,absent.txt"), "550");

    // the very next frame belongs to the next request: no advertisement
    // was queued after the 550
    assert_eq!(request(&mut control, "ls"), "200");
    let ad: Advertisement = frame::receive_text(&mut control, BUF)
        .unwrap()
        .parse()
        .unwrap();
    let listing = broker::dial(&ad).unwrap().receive(BUF).unwrap();
    assert!(listing.is_empty());

    assert_eq!(request(&mut control, "quit"), "211");
    server.join().unwrap().unwrap();
}

#[test]
fn ls_hides_server_program() {
    let srv = tempfile::tempdir().unwrap();
    let cli = tempfile::tempdir().unwrap();
    fs::write(srv.path().join("ftplite-server"), b"\x7fELF").unwrap();
    fs::write(srv.path().join("b.txt"), "b").unwrap();
    fs::write(srv.path().join("a.txt"), "a").unwrap();

    let (addr, server) = start_server(srv.path());
    let mut client = client_for(addr, cli.path());

    let listing = client.ls().unwrap();
    assert_eq!(listing, "a.txt, b.txt");
    assert!(!listing.contains("ftplite-server"));

    client.quit().unwrap();
    server.join().unwrap().unwrap();
}

#[test]
fn quit_closes_both_ends() {
    let srv = tempfile::tempdir().unwrap();
    let cli = tempfile::tempdir().unwrap();
    let (addr, server) = start_server(srv.path());
    let mut client = client_for(addr, cli.path());

    client.quit().unwrap();
    assert!(!client.is_open());
    server.join().unwrap().unwrap();

    assert!(matches!(client.ls(), Err(Error::Closed)));
    assert!(matches!(client.get("a.txt"), Err(Error::Closed)));
    assert!(matches!(client.quit(), Err(Error::Closed)));
}

#[test]
fn server_closes_control_after_quit() {
    let srv = tempfile::tempdir().unwrap();
    let (addr, server) = start_server(srv.path());
    let mut control = TcpStream::connect(addr).unwrap();

    assert_eq!(request(&mut control, "quit"), "211");

    let mut rest = Vec::new();
    control.read_to_end(&mut rest).unwrap();
    assert!(rest.is_empty());
    server.join().unwrap().unwrap();
}

#[test]
fn server_replies_to_bad_requests() {
    let srv = tempfile::tempdir().unwrap();
    let (addr, server) = start_server(srv.path());
    let mut control = TcpStream::connect(addr).unwrap();

    assert_eq!(request(&mut control, "delete,a.txt"), "500");
    assert_eq!(request(&mut control, "PUT,a.txt"), "500");
    assert_eq!(request(&mut control, "put"), "501");
    assert_eq!(request(&mut control, "get,a,b"), "501");
    assert_eq!(request(&mut control, "ls,extra"), "501");
    assert_eq!(request(&mut control, ""), "500");

    // a non-UTF-8 request is rejected without ending the session
    frame::send(&mut control, &[0xff, 0xfe]).unwrap();
    assert_eq!(frame::receive_text(&mut control, BUF).unwrap(), "500");

    fs::write(srv.path().join("still.txt"), b"here").unwrap();
    assert_eq!(request(&mut control, "ls"), "200");
    let endpoint: Advertisement = frame::receive_text(&mut control, BUF)
        .unwrap()
        .parse()
        .unwrap();
    let listing = broker::dial(&endpoint).unwrap().receive(BUF).unwrap();
    assert_eq!(&listing[..], b"still.txt");

    assert_eq!(request(&mut control, "quit"), "211");
    server.join().unwrap().unwrap();
}

#[test]
fn client_disconnect_ends_session() {
    let srv = tempfile::tempdir().unwrap();
    let (addr, server) = start_server(srv.path());

    let control = TcpStream::connect(addr).unwrap();
    drop(control);

    server.join().unwrap().unwrap();
}

#[test]
fn unreadable_local_file_sends_nothing() {
    let srv = tempfile::tempdir().unwrap();
    let cli = tempfile::tempdir().unwrap();
    let (addr, server) = start_server(srv.path());
    let mut client = client_for(addr, cli.path());

    match client.put("missing.txt") {
        Err(Error::LocalIo { path, .. }) => assert_eq!(path, cli.path().join("missing.txt")),
        other => panic!("unexpected: {:?}", other),
    }
    assert!(client.is_open());
    assert_eq!(client.ls().unwrap(), "");

    client.quit().unwrap();
    server.join().unwrap().unwrap();
}

#[test]
fn guards_reject_program_files_before_any_request() {
    let cli = tempfile::tempdir().unwrap();
    fs::write(cli.path().join("ftplite-client"), b"\x7fELF").unwrap();

    // a listener that never answers: any request would sit unread in its socket
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let mut client = client_for(addr, cli.path());
    let (mut peer, _) = listener.accept().unwrap();

    match client.put("ftplite-client") {
        Err(Error::Rejected(msg)) => assert_eq!(msg, "Cannot send client program"),
        other => panic!("unexpected: {:?}", other),
    }
    match client.get("ftplite-server") {
        Err(Error::Rejected(msg)) => assert_eq!(msg, "Cannot download server program"),
        other => panic!("unexpected: {:?}", other),
    }
    assert!(client.is_open());

    peer.set_nonblocking(true).unwrap();
    let mut buf = [0u8; 16];
    match peer.read(&mut buf) {
        Err(e) if e.kind() == ErrorKind::WouldBlock => {}
        other => panic!("server received bytes: {:?}", other),
    }
}

#[test]
fn unexpected_quit_reply_keeps_session_open() {
    let cli = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let fake = thread::spawn(move || {
        let (mut control, _) = listener.accept().unwrap();
        assert_eq!(frame::receive_text(&mut control, BUF).unwrap(), "quit");
        frame::send_text(&mut control, "500").unwrap();
        assert_eq!(frame::receive_text(&mut control, BUF).unwrap(), "quit");
        frame::send_text(&mut control, "211").unwrap();
    });

    let mut client = client_for(addr, cli.path());
    match client.quit() {
        Err(Error::Protocol(ProtocolError::UnexpectedReply { expected, got })) => {
            assert_eq!(expected, "211");
            assert_eq!(got, "500");
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert!(client.is_open());

    client.quit().unwrap();
    assert!(!client.is_open());
    fake.join().unwrap();
}

#[test]
fn lost_control_connection_closes_client() {
    let cli = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let fake = thread::spawn(move || {
        let (mut control, _) = listener.accept().unwrap();
        frame::receive_text(&mut control, BUF).unwrap();
        // hang up without replying
    });

    let mut client = client_for(addr, cli.path());
    let err = client.ls().unwrap_err();
    fake.join().unwrap();

    assert!(err.ends_session(), "unexpected: {}", err);
    assert!(!client.is_open());
    assert!(matches!(client.ls(), Err(Error::Closed)));
}
