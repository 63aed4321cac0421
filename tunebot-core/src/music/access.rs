use tunebot_common::models::Listing;

/// Decides whether a member may mutate a specific listing. This is the
/// second of the two checks the command surface runs: presence in the
/// voice channel gates use of the music module at all (checked against
/// the gateway, before this), membership in the listing's manager
/// snapshot gates mutation of that listing.
#[derive(Debug, Default)]
pub struct AccessGuard;

impl AccessGuard {
    pub fn new() -> Self {
        Self
    }

    pub fn can_manage(&self, member_id: &str, listing: &Listing) -> bool {
        listing.authorized_managers.contains(member_id)
    }
}
