use uuid::Uuid;

/// Source of unique ids for steps, operations and conditions.
pub trait UidGenerator: Send {
    fn next_uid(&mut self) -> String;
}

/// Random v4 uuids.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl UidGenerator for UuidGenerator {
    fn next_uid(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Deterministic "1", "2", ... ids.
#[derive(Debug, Default, Clone)]
pub struct SequentialUid {
    counter: u64,
}

impl SequentialUid {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UidGenerator for SequentialUid {
    fn next_uid(&mut self) -> String {
        self.counter += 1;
        self.counter.to_string()
    }
}
