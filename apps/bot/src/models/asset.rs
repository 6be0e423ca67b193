use uuid::Uuid;

/// Entity an uploaded file is linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetOwner {
    Request(Uuid),
    Response(Uuid),
}

impl AssetOwner {
    pub fn id(&self) -> Uuid {
        match self {
            AssetOwner::Request(id) | AssetOwner::Response(id) => *id,
        }
    }
}
