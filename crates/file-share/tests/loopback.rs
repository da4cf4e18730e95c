//! End-to-end transfers between two coordinators over an in-memory room.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use roomdrop_file_share::{
    Direction, LocalFile, ReceiveDecision, TransferConfig, TransferCoordinator, TransferRecord,
    TransferStatus,
};
use roomdrop_protocol::constants::DEFAULT_CHUNK_SIZE;
use roomdrop_protocol::{Action, Chunk, FileId, Message, Metadata, PeerId, Target};
use roomdrop_room::{MemoryRoom, PeerChannel, PeerInfo, RoomMember, SendFuture};

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

fn config(name: &str) -> TransferConfig {
    TransferConfig {
        display_name: name.into(),
        reassembly_grace_ms: 200,
        ..Default::default()
    }
}

/// Joins a sender and a receiver to a fresh room and attaches both.
fn pair(
    sender_config: TransferConfig,
    receiver_config: TransferConfig,
) -> (TransferCoordinator, TransferCoordinator, MemoryRoom) {
    let room = MemoryRoom::new();
    let sender = TransferCoordinator::new(sender_config);
    let receiver = TransferCoordinator::new(receiver_config);

    let (a, a_rx) = room.join("alice");
    let (b, b_rx) = room.join("bob");
    sender.attach(Arc::new(a), a_rx);
    receiver.attach(Arc::new(b), b_rx);
    (sender, receiver, room)
}

async fn wait_terminal(
    coord: &TransferCoordinator,
    id: &FileId,
    direction: Direction,
) -> TransferRecord {
    let mut rx = coord.subscribe();
    rx.wait_for(|records| {
        records
            .iter()
            .any(|r| &r.id == id && r.direction == direction && r.is_terminal())
    })
    .await
    .unwrap();
    coord.transfer(id, direction).unwrap()
}

/// Channel wrapper that tampers with outgoing chunks.
struct Tamper {
    inner: RoomMember,
    mode: Mode,
    held: Mutex<Vec<(Target, Message)>>,
}

enum Mode {
    /// Never deliver the chunk with this index.
    Withhold(u32),
    /// Hold chunks back and deliver them in reverse once the last is sent.
    Reverse,
}

impl Tamper {
    fn new(inner: RoomMember, mode: Mode) -> Self {
        Self {
            inner,
            mode,
            held: Mutex::new(Vec::new()),
        }
    }
}

impl PeerChannel for Tamper {
    fn local_peer(&self) -> PeerInfo {
        self.inner.local_peer()
    }

    fn peers(&self) -> Vec<PeerInfo> {
        self.inner.peers()
    }

    fn send(&self, target: Target, message: Message) -> SendFuture<'_> {
        Box::pin(async move {
            if message.action != Action::Chunk {
                return self.inner.send(target, message).await;
            }
            let chunk: Chunk = message.parse_payload().unwrap();
            match self.mode {
                Mode::Withhold(index) if chunk.index == index => Ok(()),
                Mode::Withhold(_) => self.inner.send(target, message).await,
                Mode::Reverse => {
                    let release = {
                        let mut held = self.held.lock().unwrap();
                        held.push((target, message));
                        if chunk.is_last {
                            std::mem::take(&mut *held)
                        } else {
                            Vec::new()
                        }
                    };
                    for (target, message) in release.into_iter().rev() {
                        self.inner.send(target, message).await?;
                    }
                    Ok(())
                }
            }
        })
    }
}

fn tampered_pair(mode: Mode) -> (TransferCoordinator, TransferCoordinator, MemoryRoom) {
    let room = MemoryRoom::new();
    let sender = TransferCoordinator::new(config("alice"));
    let receiver = TransferCoordinator::new(config("bob"));

    let (a, a_rx) = room.join("alice");
    let (b, b_rx) = room.join("bob");
    sender.attach(Arc::new(Tamper::new(a, mode)), a_rx);
    receiver.attach(Arc::new(b), b_rx);
    (sender, receiver, room)
}

#[tokio::test(start_paused = true)]
async fn forty_kib_file_arrives_intact() {
    let dir = tempfile::tempdir().unwrap();
    let (sender, receiver, _room) = pair(
        config("alice"),
        TransferConfig {
            download_dir: dir.path().to_path_buf(),
            ..config("bob")
        },
    );
    let data = pattern(40 * 1024);

    let id = sender
        .send_file(LocalFile::new("photo.png", data.clone()), None)
        .await;

    let sent = wait_terminal(&sender, &id, Direction::Send).await;
    assert_eq!(sent.status, TransferStatus::Completed);
    assert_eq!(sent.progress, 100);

    let received = wait_terminal(&receiver, &id, Direction::Receive).await;
    assert_eq!(received.status, TransferStatus::Completed);
    assert_eq!(received.name, "photo.png");
    assert_eq!(received.content_type, "image/png");
    assert_eq!(received.peer_name, "alice");
    assert_eq!(received.payload.as_deref(), Some(&data[..]));

    let path = receiver.download_file(&id).await.unwrap().unwrap();
    assert_eq!(path, dir.path().join("photo.png"));
    assert_eq!(std::fs::read(&path).unwrap(), data);

    // A second download does not clobber the first.
    let again = receiver.download_file(&id).await.unwrap().unwrap();
    assert_eq!(again, dir.path().join("photo (1).png"));
}

#[tokio::test(start_paused = true)]
async fn receiver_progress_is_monotonic() {
    let (sender, receiver, _room) = pair(
        TransferConfig {
            chunk_size: 1024,
            ..config("alice")
        },
        config("bob"),
    );
    let mut updates = receiver.subscribe();
    let id = sender
        .send_file(LocalFile::new("log.txt", pattern(20 * 1024)), None)
        .await;

    let mut seen = Vec::new();
    loop {
        updates.changed().await.unwrap();
        let record = updates
            .borrow_and_update()
            .iter()
            .find(|r| r.id == id)
            .cloned();
        let Some(record) = record else { continue };
        if record.status == TransferStatus::Pending {
            assert_eq!(record.progress, 0);
        }
        seen.push(record.progress);
        if record.is_terminal() {
            assert_eq!(record.status, TransferStatus::Completed);
            break;
        }
    }
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
    assert_eq!(seen.last(), Some(&100));
}

#[tokio::test(start_paused = true)]
async fn reverse_delivery_still_completes() {
    let (sender, receiver, _room) = tampered_pair(Mode::Reverse);
    let data = pattern(40 * 1024);
    let id = sender
        .send_file(LocalFile::new("a.bin", data.clone()), None)
        .await;

    let received = wait_terminal(&receiver, &id, Direction::Receive).await;
    assert_eq!(received.status, TransferStatus::Completed);
    assert_eq!(received.payload.as_deref(), Some(&data[..]));
}

#[tokio::test(start_paused = true)]
async fn withheld_chunk_never_completes() {
    let data = pattern(40 * 1024);
    let total = roomdrop_protocol::total_chunks(data.len() as u64, DEFAULT_CHUNK_SIZE);
    for withheld in 0..total {
        let (sender, receiver, _room) = tampered_pair(Mode::Withhold(withheld));
        let id = sender
            .send_file(LocalFile::new("a.bin", data.clone()), None)
            .await;
        let sent = wait_terminal(&sender, &id, Direction::Send).await;
        assert_eq!(sent.status, TransferStatus::Completed);

        if withheld + 1 == total {
            // Without the last marker the receiver keeps waiting.
            let waited = tokio::time::timeout(
                Duration::from_secs(5),
                wait_terminal(&receiver, &id, Direction::Receive),
            )
            .await;
            assert!(waited.is_err());
            let received = receiver.transfer(&id, Direction::Receive).unwrap();
            assert_eq!(received.status, TransferStatus::Transferring);
            assert!(received.payload.is_none());
        } else {
            let received = wait_terminal(&receiver, &id, Direction::Receive).await;
            assert_eq!(received.status, TransferStatus::Failed);
            assert_eq!(
                received.error,
                Some(format!("reassembly failed: missing chunk {withheld}"))
            );
            assert!(received.payload.is_none());
        }
        assert!(receiver.download_file(&id).await.unwrap().is_none());
    }
}

#[tokio::test(start_paused = true)]
async fn rejection_short_circuits_both_sides() {
    let (sender, receiver, _room) = pair(config("alice"), config("bob"));
    let announced = Arc::new(Mutex::new(Vec::new()));
    let log = announced.clone();
    receiver.set_receive_handler(Some(Arc::new(
        move |metadata: Metadata, decision: ReceiveDecision| {
            log.lock().unwrap().push(metadata.name.clone());
            decision.reject("not today");
        },
    )));

    let id = sender
        .send_file(LocalFile::new("big.iso", pattern(64 * 1024)), None)
        .await;

    let sent = wait_terminal(&sender, &id, Direction::Send).await;
    assert_eq!(sent.status, TransferStatus::Failed);
    assert_eq!(sent.error.as_deref(), Some("not today"));

    let received = wait_terminal(&receiver, &id, Direction::Receive).await;
    assert_eq!(received.status, TransferStatus::Failed);
    assert_eq!(received.progress, 0);
    assert_eq!(*announced.lock().unwrap(), vec!["big.iso".to_string()]);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        receiver.transfer(&id, Direction::Receive).unwrap().status,
        TransferStatus::Failed
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_transfers_stay_independent() {
    let (sender, receiver, _room) = pair(
        TransferConfig {
            chunk_size: 512,
            batch_size: 2,
            ..config("alice")
        },
        config("bob"),
    );
    let first = pattern(10 * 1024);
    let second: Vec<u8> = pattern(7 * 1024).into_iter().map(|b| b ^ 0xff).collect();

    let (a, b) = tokio::join!(
        sender.send_file(LocalFile::new("first.bin", first.clone()), None),
        sender.send_file(LocalFile::new("second.bin", second.clone()), None),
    );
    assert_ne!(a, b);

    let ra = wait_terminal(&receiver, &a, Direction::Receive).await;
    let rb = wait_terminal(&receiver, &b, Direction::Receive).await;
    assert_eq!(ra.payload.as_deref(), Some(&first[..]));
    assert_eq!(rb.payload.as_deref(), Some(&second[..]));
}

#[tokio::test(start_paused = true)]
async fn removing_in_flight_send_stops_stream() {
    let (sender, receiver, _room) = pair(
        TransferConfig {
            chunk_size: 1024,
            batch_size: 1,
            batch_pause_ms: 100,
            ..config("alice")
        },
        TransferConfig {
            reassembly_grace_ms: 60_000,
            ..config("bob")
        },
    );
    let id = sender
        .send_file(LocalFile::new("a.bin", pattern(50 * 1024)), None)
        .await;

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(sender.remove_transfer(&id));
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(sender.transfer(&id, Direction::Send).is_none());
    let received = receiver.transfer(&id, Direction::Receive).unwrap();
    assert_eq!(received.status, TransferStatus::Transferring);
    assert!(received.progress < 100);
}

#[tokio::test(start_paused = true)]
async fn explicit_target_among_several_peers() {
    let room = MemoryRoom::new();
    let sender = TransferCoordinator::new(config("alice"));
    let bob = TransferCoordinator::new(config("bob"));
    let carol = TransferCoordinator::new(config("carol"));

    let (a, a_rx) = room.join("alice");
    let (b, b_rx) = room.join("bob");
    let (c, c_rx) = room.join("carol");
    let carol_id: PeerId = c.local_peer().id;
    sender.attach(Arc::new(a), a_rx);
    bob.attach(Arc::new(b), b_rx);
    carol.attach(Arc::new(c), c_rx);

    let id = sender
        .send_file(LocalFile::new("note.txt", b"hi carol".to_vec()), Some(carol_id.clone()))
        .await;

    let received = wait_terminal(&carol, &id, Direction::Receive).await;
    assert_eq!(received.payload.as_deref(), Some(&b"hi carol"[..]));
    assert_eq!(
        sender.transfer(&id, Direction::Send).unwrap().peer_id,
        carol_id
    );
    assert!(bob.transfers().is_empty());
}

#[tokio::test(start_paused = true)]
async fn reattached_room_keeps_working() {
    let room = MemoryRoom::new();
    let sender = TransferCoordinator::new(config("alice"));
    let receiver = TransferCoordinator::new(config("bob"));
    let (b, b_rx) = room.join("bob");
    receiver.attach(Arc::new(b), b_rx);

    let (a1, a1_rx) = room.join("alice");
    sender.attach(Arc::new(a1), a1_rx);
    let (a2, a2_rx) = room.join("alice");
    sender.attach(Arc::new(a2), a2_rx);

    // The first member left when its channel was replaced.
    assert_eq!(room.members().len(), 2);

    let id = sender
        .send_file(LocalFile::new("a.txt", b"again".to_vec()), None)
        .await;
    let sent = wait_terminal(&sender, &id, Direction::Send).await;
    assert_eq!(sent.status, TransferStatus::Completed);
    let received = wait_terminal(&receiver, &id, Direction::Receive).await;
    assert_eq!(received.payload.as_deref(), Some(&b"again"[..]));
}

#[tokio::test(start_paused = true)]
async fn empty_file_transfers() {
    let (sender, receiver, _room) = pair(config("alice"), config("bob"));
    let id = sender
        .send_file(LocalFile::new("empty.txt", Vec::new()), None)
        .await;

    assert_eq!(
        wait_terminal(&sender, &id, Direction::Send).await.status,
        TransferStatus::Completed
    );
    let received = wait_terminal(&receiver, &id, Direction::Receive).await;
    assert_eq!(received.status, TransferStatus::Completed);
    assert_eq!(received.payload.as_deref(), Some(&b""[..]));
}
