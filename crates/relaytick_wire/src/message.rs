//! One struct per wire message kind, each with a byte-exact `encode`/
//! `decode` pair matching the frame layout: `u8 type, u32 tick` header
//! followed by a kind-specific body. All multibyte integers are
//! little-endian; variable-length integers use [`crate::varint`].

use relaytick_component::{ComponentId, Entity, RelationId};

use crate::error::WireError;
use crate::varint::{read_uvarint, write_uvarint};

/// The `u8` discriminant each message kind is framed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    Handshake = 0x01,
    Clocksync = 0x02,
    Transaction = 0x03,
    Command = 0x04,
    Snapshot = 0x05,
}

impl MessageKind {
    fn from_u8(byte: u8) -> Result<Self, WireError> {
        match byte {
            0x01 => Ok(Self::Handshake),
            0x02 => Ok(Self::Clocksync),
            0x03 => Ok(Self::Transaction),
            0x04 => Ok(Self::Command),
            0x05 => Ok(Self::Snapshot),
            _ => Err(WireError::InvalidVarint),
        }
    }
}

/// Frame header: message kind and the tick it was produced at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub kind: MessageKind,
    pub tick: u32,
}

/// Writes the `u8 type, u32 tick` header.
pub fn write_header(kind: MessageKind, tick: u32, buf: &mut Vec<u8>) {
    buf.push(kind as u8);
    buf.extend_from_slice(&tick.to_le_bytes());
}

/// Reads the `u8 type, u32 tick` header from the front of `buf`.
pub fn read_header(buf: &[u8]) -> Result<(FrameHeader, usize), WireError> {
    if buf.len() < 5 {
        return Err(WireError::Truncated);
    }
    let kind = MessageKind::from_u8(buf[0])?;
    let tick = u32::from_le_bytes(buf[1..5].try_into().unwrap());
    Ok((FrameHeader { kind, tick }, 5))
}

fn write_entity(entity: Entity, buf: &mut Vec<u8>) {
    write_uvarint(u64::from(entity.raw()), buf);
}

fn read_entity(buf: &[u8]) -> Result<(Entity, usize), WireError> {
    let (raw, n) = read_uvarint(buf)?;
    Ok((Entity::from_raw(raw as u32), n))
}

fn write_component_id(id: ComponentId, buf: &mut Vec<u8>) {
    write_uvarint(u64::from(id.0), buf);
}

fn read_component_id(buf: &[u8]) -> Result<(ComponentId, usize), WireError> {
    let (raw, n) = read_uvarint(buf)?;
    Ok((ComponentId(raw as u32), n))
}

fn write_payload(payload: &[u8], buf: &mut Vec<u8>) {
    write_uvarint(payload.len() as u64, buf);
    buf.extend_from_slice(payload);
}

fn read_payload<'a>(buf: &'a [u8]) -> Result<(&'a [u8], usize), WireError> {
    let (len, n) = read_uvarint(buf)?;
    let len = len as usize;
    let rest = buf.get(n..).ok_or(WireError::Truncated)?;
    let payload = rest.get(..len).ok_or(WireError::Truncated)?;
    Ok((payload, n + len))
}

/// A relation attachment carried alongside a component op: `(relation,
/// object)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationRef {
    pub relation: RelationId,
    pub object: Entity,
}

fn write_relation_opt(relation: Option<RelationRef>, buf: &mut Vec<u8>) {
    match relation {
        Some(r) => {
            buf.push(1);
            write_uvarint(u64::from(r.relation.0), buf);
            write_entity(r.object, buf);
        }
        None => buf.push(0),
    }
}

fn read_relation_opt(buf: &[u8]) -> Result<(Option<RelationRef>, usize), WireError> {
    let flag = *buf.first().ok_or(WireError::Truncated)?;
    let mut cursor = 1;
    if flag == 0 {
        return Ok((None, cursor));
    }
    let (relation_raw, n) = read_uvarint(&buf[cursor..])?;
    cursor += n;
    let (object, n) = read_entity(&buf[cursor..])?;
    cursor += n;
    Ok((
        Some(RelationRef {
            relation: RelationId(relation_raw as u32),
            object,
        }),
        cursor,
    ))
}

/// Server→client greeting: which domain the client has been assigned and
/// the tick the producer is currently at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerHandshake {
    pub domain_id: u8,
    pub tick: u32,
}

impl ServerHandshake {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.domain_id);
        buf.extend_from_slice(&self.tick.to_le_bytes());
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize), WireError> {
        if buf.len() < 5 {
            return Err(WireError::Truncated);
        }
        let domain_id = buf[0];
        let tick = u32::from_le_bytes(buf[1..5].try_into().unwrap());
        Ok((Self { domain_id, tick }, 5))
    }
}

/// Client→server greeting: the protocol version the client speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientHandshake {
    pub version: u8,
}

impl ClientHandshake {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.version);
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize), WireError> {
        let version = *buf.first().ok_or(WireError::Truncated)?;
        Ok((Self { version }, 1))
    }
}

/// One clock-sync sample exchange: `(t0 local-send, t1 remote-receive, t2
/// local-receive)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clocksync {
    pub t0: f64,
    pub t1: f64,
    pub t2: f64,
}

impl Clocksync {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.t0.to_le_bytes());
        buf.extend_from_slice(&self.t1.to_le_bytes());
        buf.extend_from_slice(&self.t2.to_le_bytes());
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize), WireError> {
        if buf.len() < 24 {
            return Err(WireError::Truncated);
        }
        let t0 = f64::from_le_bytes(buf[0..8].try_into().unwrap());
        let t1 = f64::from_le_bytes(buf[8..16].try_into().unwrap());
        let t2 = f64::from_le_bytes(buf[16..24].try_into().unwrap());
        Ok((Self { t0, t1, t2 }, 24))
    }
}

/// One component attached during a `Spawn`: its id, payload (absent for
/// tags), and an optional relation attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnComponent {
    pub id: ComponentId,
    pub payload: Option<Vec<u8>>,
    pub relation: Option<RelationRef>,
}

/// One operation inside a [`Transaction`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOp {
    Spawn {
        entity: Entity,
        components: Vec<SpawnComponent>,
        causal_key: Option<u32>,
    },
    Despawn {
        entity: Entity,
    },
    Set {
        entity: Entity,
        component: ComponentId,
        payload: Option<Vec<u8>>,
        version: Option<u64>,
        relation: Option<RelationRef>,
    },
    Remove {
        entity: Entity,
        component: ComponentId,
    },
    Add {
        entity: Entity,
        component: ComponentId,
        payload: Option<Vec<u8>>,
        relation: Option<RelationRef>,
    },
}

impl TransactionOp {
    fn op_code(&self) -> u8 {
        match self {
            TransactionOp::Spawn { .. } => 1,
            TransactionOp::Despawn { .. } => 2,
            TransactionOp::Set { .. } => 3,
            TransactionOp::Remove { .. } => 4,
            TransactionOp::Add { .. } => 5,
        }
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.op_code());
        match self {
            TransactionOp::Spawn { entity, components, causal_key } => {
                write_entity(*entity, buf);
                buf.extend_from_slice(&(components.len() as u16).to_le_bytes());
                for component in components {
                    write_component_id(component.id, buf);
                    if let Some(payload) = &component.payload {
                        write_payload(payload, buf);
                    }
                    write_relation_opt(component.relation, buf);
                }
                match causal_key {
                    Some(key) => {
                        buf.push(1);
                        buf.extend_from_slice(&key.to_le_bytes());
                    }
                    None => buf.push(0),
                }
            }
            TransactionOp::Despawn { entity } => write_entity(*entity, buf),
            TransactionOp::Set { entity, component, payload, version, relation } => {
                write_entity(*entity, buf);
                write_component_id(*component, buf);
                if let Some(payload) = payload {
                    write_payload(payload, buf);
                }
                match version {
                    Some(v) => {
                        buf.push(1);
                        write_uvarint(*v, buf);
                    }
                    None => buf.push(0),
                }
                write_relation_opt(*relation, buf);
            }
            TransactionOp::Remove { entity, component } => {
                write_entity(*entity, buf);
                write_component_id(*component, buf);
            }
            TransactionOp::Add { entity, component, payload, relation } => {
                write_entity(*entity, buf);
                write_component_id(*component, buf);
                match payload {
                    Some(p) => {
                        buf.push(1);
                        write_payload(p, buf);
                    }
                    None => buf.push(0),
                }
                write_relation_opt(*relation, buf);
            }
        }
    }

    /// Decodes one op, given whether `component` is a tag for ops whose
    /// payload presence isn't itself carried on the wire (`Set`/`Spawn`'s
    /// per-component entries omit the payload entirely for tags, matching
    /// the encoded side skipping `write_payload` for them).
    fn decode(buf: &[u8], is_tag: impl Fn(ComponentId) -> bool) -> Result<(Self, usize), WireError> {
        let op_code = *buf.first().ok_or(WireError::Truncated)?;
        let mut cursor = 1;
        let op = match op_code {
            1 => {
                let (entity, n) = read_entity(&buf[cursor..])?;
                cursor += n;
                if buf.len() < cursor + 2 {
                    return Err(WireError::Truncated);
                }
                let count = u16::from_le_bytes(buf[cursor..cursor + 2].try_into().unwrap());
                cursor += 2;
                let mut components = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let (id, n) = read_component_id(&buf[cursor..])?;
                    cursor += n;
                    let payload = if is_tag(id) {
                        None
                    } else {
                        let (p, n) = read_payload(&buf[cursor..])?;
                        cursor += n;
                        Some(p.to_vec())
                    };
                    let (relation, n) = read_relation_opt(&buf[cursor..])?;
                    cursor += n;
                    components.push(SpawnComponent { id, payload, relation });
                }
                let has_causal = *buf.get(cursor).ok_or(WireError::Truncated)?;
                cursor += 1;
                let causal_key = if has_causal != 0 {
                    if buf.len() < cursor + 4 {
                        return Err(WireError::Truncated);
                    }
                    let key = u32::from_le_bytes(buf[cursor..cursor + 4].try_into().unwrap());
                    cursor += 4;
                    Some(key)
                } else {
                    None
                };
                TransactionOp::Spawn { entity, components, causal_key }
            }
            2 => {
                let (entity, n) = read_entity(&buf[cursor..])?;
                cursor += n;
                TransactionOp::Despawn { entity }
            }
            3 => {
                let (entity, n) = read_entity(&buf[cursor..])?;
                cursor += n;
                let (component, n) = read_component_id(&buf[cursor..])?;
                cursor += n;
                let payload = if is_tag(component) {
                    None
                } else {
                    let (p, n) = read_payload(&buf[cursor..])?;
                    cursor += n;
                    Some(p.to_vec())
                };
                let has_version = *buf.get(cursor).ok_or(WireError::Truncated)?;
                cursor += 1;
                let version = if has_version != 0 {
                    let (v, n) = read_uvarint(&buf[cursor..])?;
                    cursor += n;
                    Some(v)
                } else {
                    None
                };
                let (relation, n) = read_relation_opt(&buf[cursor..])?;
                cursor += n;
                TransactionOp::Set { entity, component, payload, version, relation }
            }
            4 => {
                let (entity, n) = read_entity(&buf[cursor..])?;
                cursor += n;
                let (component, n) = read_component_id(&buf[cursor..])?;
                cursor += n;
                TransactionOp::Remove { entity, component }
            }
            5 => {
                let (entity, n) = read_entity(&buf[cursor..])?;
                cursor += n;
                let (component, n) = read_component_id(&buf[cursor..])?;
                cursor += n;
                let has_payload = *buf.get(cursor).ok_or(WireError::Truncated)?;
                cursor += 1;
                let payload = if has_payload != 0 {
                    let (p, n) = read_payload(&buf[cursor..])?;
                    cursor += n;
                    Some(p.to_vec())
                } else {
                    None
                };
                let (relation, n) = read_relation_opt(&buf[cursor..])?;
                cursor += n;
                TransactionOp::Add { entity, component, payload, relation }
            }
            _ => return Err(WireError::InvalidVarint),
        };
        Ok((op, cursor))
    }
}

/// A batch of ops committed atomically at one producer tick, identified by
/// `(domain, seq)` for strict per-producer ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub domain_id: u8,
    pub seq: u64,
    pub ops: Vec<TransactionOp>,
}

impl Transaction {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.domain_id);
        write_uvarint(self.seq, buf);
        buf.extend_from_slice(&(self.ops.len() as u16).to_le_bytes());
        for op in &self.ops {
            op.encode(buf);
        }
    }

    pub fn decode(buf: &[u8], is_tag: impl Fn(ComponentId) -> bool) -> Result<(Self, usize), WireError> {
        if buf.is_empty() {
            return Err(WireError::Truncated);
        }
        let domain_id = buf[0];
        let mut cursor = 1;
        let (seq, n) = read_uvarint(&buf[cursor..])?;
        cursor += n;
        if buf.len() < cursor + 2 {
            return Err(WireError::Truncated);
        }
        let op_count = u16::from_le_bytes(buf[cursor..cursor + 2].try_into().unwrap());
        cursor += 2;
        let mut ops = Vec::with_capacity(op_count as usize);
        for _ in 0..op_count {
            let (op, n) = TransactionOp::decode(&buf[cursor..], &is_tag)?;
            cursor += n;
            ops.push(op);
        }
        Ok((Self { domain_id, seq, ops }, cursor))
    }
}

/// One ephemeral command targeting an entity, keyed by causal key at the
/// replication layer rather than on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandEntry {
    pub target: Entity,
    pub component: ComponentId,
    pub payload: Option<Vec<u8>>,
}

/// A batch of player/client commands sent in one packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub entries: Vec<CommandEntry>,
}

impl Command {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        for entry in &self.entries {
            write_entity(entry.target, buf);
            write_component_id(entry.component, buf);
            match &entry.payload {
                Some(p) => {
                    buf.push(1);
                    write_payload(p, buf);
                }
                None => buf.push(0),
            }
        }
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize), WireError> {
        if buf.len() < 2 {
            return Err(WireError::Truncated);
        }
        let count = u16::from_le_bytes(buf[0..2].try_into().unwrap());
        let mut cursor = 2;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (target, n) = read_entity(&buf[cursor..])?;
            cursor += n;
            let (component, n) = read_component_id(&buf[cursor..])?;
            cursor += n;
            let has_payload = *buf.get(cursor).ok_or(WireError::Truncated)?;
            cursor += 1;
            let payload = if has_payload != 0 {
                let (p, n) = read_payload(&buf[cursor..])?;
                cursor += n;
                Some(p.to_vec())
            } else {
                None
            };
            entries.push(CommandEntry { target, component, payload });
        }
        Ok((Self { entries }, cursor))
    }
}

/// One `(component, row count, [(entity, payload)]*)` block of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotBlock {
    pub component: ComponentId,
    pub rows: Vec<(Entity, Vec<u8>)>,
}

/// A full-state dump of a set of components, kept as raw bytes until a
/// caller actually needs to walk its blocks — the snapshot path is the one
/// place large enough that eagerly parsing every row on receipt isn't
/// worth it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub bytes: Vec<u8>,
}

impl Snapshot {
    /// Builds a snapshot body from its logical blocks.
    #[must_use]
    pub fn from_blocks(blocks: &[SnapshotBlock]) -> Self {
        let mut bytes = Vec::new();
        for block in blocks {
            write_component_id(block.component, &mut bytes);
            bytes.extend_from_slice(&(block.rows.len() as u32).to_le_bytes());
            for (entity, payload) in &block.rows {
                write_entity(*entity, &mut bytes);
                write_payload(payload, &mut bytes);
            }
        }
        Self { bytes }
    }

    /// Lazily decodes the blocks out of this snapshot's body.
    pub fn blocks(&self) -> Result<Vec<SnapshotBlock>, WireError> {
        let mut cursor = 0;
        let mut blocks = Vec::new();
        while cursor < self.bytes.len() {
            let (component, n) = read_component_id(&self.bytes[cursor..])?;
            cursor += n;
            if self.bytes.len() < cursor + 4 {
                return Err(WireError::Truncated);
            }
            let row_count = u32::from_le_bytes(self.bytes[cursor..cursor + 4].try_into().unwrap());
            cursor += 4;
            let mut rows = Vec::with_capacity(row_count as usize);
            for _ in 0..row_count {
                let (entity, n) = read_entity(&self.bytes[cursor..])?;
                cursor += n;
                let (payload, n) = read_payload(&self.bytes[cursor..])?;
                cursor += n;
                rows.push((entity, payload.to_vec()));
            }
            blocks.push(SnapshotBlock { component, rows });
        }
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let mut buf = Vec::new();
        write_header(MessageKind::Transaction, 42, &mut buf);
        let (header, n) = read_header(&buf).unwrap();
        assert_eq!(header.kind, MessageKind::Transaction);
        assert_eq!(header.tick, 42);
        assert_eq!(n, 5);
    }

    #[test]
    fn test_server_handshake_roundtrip() {
        let hs = ServerHandshake { domain_id: 3, tick: 100 };
        let mut buf = Vec::new();
        hs.encode(&mut buf);
        let (decoded, n) = ServerHandshake::decode(&buf).unwrap();
        assert_eq!(decoded, hs);
        assert_eq!(n, buf.len());
    }

    #[test]
    fn test_clocksync_roundtrip() {
        let cs = Clocksync { t0: 100.0, t1: 200.0, t2: 110.0 };
        let mut buf = Vec::new();
        cs.encode(&mut buf);
        let (decoded, n) = Clocksync::decode(&buf).unwrap();
        assert_eq!(decoded, cs);
        assert_eq!(n, 24);
    }

    #[test]
    fn test_transaction_roundtrip_with_spawn_and_relation() {
        use relaytick_component::Domain;
        let entity = Entity::new(Domain(1), 5);
        let parent = Entity::new(Domain(1), 1);
        let txn = Transaction {
            domain_id: 1,
            seq: 7,
            ops: vec![TransactionOp::Spawn {
                entity,
                components: vec![
                    SpawnComponent {
                        id: ComponentId(2),
                        payload: Some(vec![1, 2, 3]),
                        relation: Some(RelationRef { relation: RelationId(0), object: parent }),
                    },
                    SpawnComponent { id: ComponentId(9), payload: None, relation: None },
                ],
                causal_key: Some(0xdead_beef),
            }],
        };
        let mut buf = Vec::new();
        txn.encode(&mut buf);
        let (decoded, n) = Transaction::decode(&buf, |id| id == ComponentId(9)).unwrap();
        assert_eq!(decoded, txn);
        assert_eq!(n, buf.len());
    }

    #[test]
    fn test_transaction_roundtrip_set_and_remove() {
        use relaytick_component::Domain;
        let entity = Entity::new(Domain(0), 1);
        let txn = Transaction {
            domain_id: 0,
            seq: 1,
            ops: vec![
                TransactionOp::Set {
                    entity,
                    component: ComponentId(1),
                    payload: Some(vec![9, 9]),
                    version: Some(4),
                    relation: None,
                },
                TransactionOp::Remove { entity, component: ComponentId(1) },
                TransactionOp::Despawn { entity },
            ],
        };
        let mut buf = Vec::new();
        txn.encode(&mut buf);
        let (decoded, n) = Transaction::decode(&buf, |_| false).unwrap();
        assert_eq!(decoded, txn);
        assert_eq!(n, buf.len());
    }

    #[test]
    fn test_command_roundtrip() {
        use relaytick_component::Domain;
        let command = Command {
            entries: vec![CommandEntry {
                target: Entity::new(Domain(1), 3),
                component: ComponentId(4),
                payload: Some(vec![1]),
            }],
        };
        let mut buf = Vec::new();
        command.encode(&mut buf);
        let (decoded, n) = Command::decode(&buf).unwrap();
        assert_eq!(decoded, command);
        assert_eq!(n, buf.len());
    }

    #[test]
    fn test_snapshot_blocks_roundtrip() {
        use relaytick_component::Domain;
        let blocks = vec![SnapshotBlock {
            component: ComponentId(1),
            rows: vec![
                (Entity::new(Domain(0), 1), vec![1, 0, 0, 0]),
                (Entity::new(Domain(0), 2), vec![2, 0, 0, 0]),
            ],
        }];
        let snapshot = Snapshot::from_blocks(&blocks);
        assert_eq!(snapshot.blocks().unwrap(), blocks);
    }

    #[test]
    fn test_truncated_transaction_errors() {
        let buf = [0u8, 1];
        assert!(Transaction::decode(&buf, |_| false).is_err());
    }
}
