/// The reserved environment record: `{ nextInstanceId: u64, nextHashCode: i32 }`
/// encoded as a 12-byte big-endian blob (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnvironmentState {
    pub next_instance_id: u64,
    pub next_hash_code: i32,
}

impl EnvironmentState {
    pub fn encode(&self) -> [u8; 12] {
        let mut out = [0u8; 12];
        out[0..8].copy_from_slice(&self.next_instance_id.to_be_bytes());
        out[8..12].copy_from_slice(&self.next_hash_code.to_be_bytes());
        out
    }

    pub fn decode(bytes: &[u8; 12]) -> Self {
        let mut id_buf = [0u8; 8];
        id_buf.copy_from_slice(&bytes[0..8]);
        let mut hc_buf = [0u8; 4];
        hc_buf.copy_from_slice(&bytes[8..12]);
        Self {
            next_instance_id: u64::from_be_bytes(id_buf),
            next_hash_code: i32::from_be_bytes(hc_buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trips() {
        let env = EnvironmentState {
            next_instance_id: 0x0102_0304_0506_0708,
            next_hash_code: -42,
        };
        let bytes = env.encode();
        assert_eq!(EnvironmentState::decode(&bytes), env);
    }
}
