use glam::{IVec3, Vec3};
use proptest::prelude::*;

use lanblock::Block;
use lanblock::net::{BlockEdit, FrameBuffer, Message, PlayerFlags, PlayerState, encode_frame};

fn vec3_strategy() -> impl Strategy<Value = Vec3> {
    (-1.0e4f32..1.0e4, -1.0e4f32..1.0e4, -1.0e4f32..1.0e4).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn state_strategy() -> impl Strategy<Value = PlayerState> {
    (any::<u8>(), vec3_strategy(), vec3_strategy(), -180.0f32..180.0, -90.0f32..90.0, 0u8..4, any::<u8>())
        .prop_map(|(id, position, velocity, yaw, pitch, flags, selected_slot)| PlayerState {
            id,
            position,
            velocity,
            yaw,
            pitch,
            flags: PlayerFlags::from_bits_truncate(flags),
            selected_slot,
        })
}

fn message_strategy() -> impl Strategy<Value = Message> {
    prop_oneof![
        "[a-zA-Z0-9_]{0,31}".prop_map(|name| Message::ConnectRequest { name }),
        any::<u32>().prop_map(|timestamp_ms| Message::Heartbeat { timestamp_ms }),
        any::<u8>().prop_map(|id| Message::PlayerLeave { id }),
        Just(Message::Disconnect),
        state_strategy().prop_map(Message::PlayerState),
        prop::collection::vec(state_strategy(), 0..8).prop_map(Message::PlayerStates),
        (any::<i32>(), any::<i32>(), any::<i32>(), any::<u16>(), any::<u8>(), any::<u8>()).prop_map(
            |(x, y, z, block_type, metadata, author)| {
                Message::BlockChange(BlockEdit::new(
                    IVec3::new(x, y, z),
                    Block::new(block_type, metadata),
                    author,
                ))
            }
        ),
        prop::collection::vec(any::<u8>(), 0..256).prop_map(|data| Message::ChunkResponse { data }),
        (0.0f32..24.0).prop_map(|time_of_day| Message::TimeSync { time_of_day }),
    ]
}

proptest! {
    #[test]
    fn prop_reassembly_ignores_chunking(
        messages in prop::collection::vec(message_strategy(), 1..16),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..32),
    ) {
        let mut stream = Vec::new();
        for (seq, message) in messages.iter().enumerate() {
            stream.extend(encode_frame(message, seq as u32).unwrap());
        }

        let mut points: Vec<usize> = cuts.iter().map(|c| c.index(stream.len() + 1)).collect();
        points.push(0);
        points.push(stream.len());
        points.sort_unstable();
        points.dedup();

        let mut buffer = FrameBuffer::new();
        let mut decoded = Vec::new();
        for window in points.windows(2) {
            buffer.extend(&stream[window[0]..window[1]]);
            for frame in buffer.frames() {
                let frame = frame.unwrap();
                decoded.push((frame.header.sequence, frame.decode().unwrap()));
            }
        }

        prop_assert!(buffer.is_empty());
        prop_assert_eq!(decoded.len(), messages.len());
        for (index, (seq, message)) in decoded.into_iter().enumerate() {
            prop_assert_eq!(seq, index as u32);
            prop_assert_eq!(&message, &messages[index]);
        }
    }

    #[test]
    fn prop_garbage_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let mut buffer = FrameBuffer::new();
        buffer.extend(&bytes);
        for frame in buffer.frames() {
            match frame {
                Ok(frame) => {
                    let _ = frame.decode();
                }
                Err(_) => break,
            }
        }
    }

    #[test]
    fn prop_payload_decode_never_panics(
        message_type in any::<u8>(),
        payload in prop::collection::vec(any::<u8>(), 0..128),
    ) {
        let _ = Message::decode(message_type, &payload);
    }
}
