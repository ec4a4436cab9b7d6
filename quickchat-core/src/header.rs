// ABOUTME: Channel header summary: name, member count, and an online count derived from AI presence.
// ABOUTME: The online figure counts the local user plus one when an agent is present.

/// Rendered state of a channel header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHeader {
    pub name: Option<String>,
    pub member_count: usize,
    pub online: usize,
}

impl ChannelHeader {
    pub fn new(name: Option<String>, member_count: usize, agent_present: bool) -> Self {
        Self {
            name,
            member_count,
            online: if agent_present { 2 } else { 1 },
        }
    }

    pub fn title(&self) -> &str {
        self.name.as_deref().unwrap_or("Unnamed channel")
    }

    pub fn info_line(&self) -> String {
        format!("{} members, {} online", self.member_count, self.online)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_online_counts_agent() {
        let header = ChannelHeader::new(Some("ai".to_string()), 3, true);
        assert_eq!(header.online, 2);
        assert_eq!(header.info_line(), "3 members, 2 online");
        assert_eq!(header.title(), "ai");
    }

    #[test]
    fn test_without_agent_or_name() {
        let header = ChannelHeader::new(None, 1, false);
        assert_eq!(header.info_line(), "1 members, 1 online");
        assert_eq!(header.title(), "Unnamed channel");
    }
}
