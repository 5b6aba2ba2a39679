//! Packet ids and constants for Minecraft Java 1.20.4 (protocol 765)

pub const PROTOCOL_VERSION: i32 = 765;
pub const GAME_VERSION: &str = "1.20.4";

/// Map an announced game version onto its wire protocol number
pub fn protocol_for(version: &str) -> Option<i32> {
    match version {
        GAME_VERSION => Some(PROTOCOL_VERSION),
        _ => None,
    }
}

pub mod handshake {
    pub const INTENTION: i32 = 0x00;
    pub const NEXT_STATE_LOGIN: i32 = 2;
}

pub mod login {
    pub mod clientbound {
        pub const DISCONNECT: i32 = 0x00;
        pub const ENCRYPTION_REQUEST: i32 = 0x01;
        pub const SUCCESS: i32 = 0x02;
        pub const SET_COMPRESSION: i32 = 0x03;
    }

    pub mod serverbound {
        pub const HELLO: i32 = 0x00;
        pub const ACKNOWLEDGED: i32 = 0x03;
    }
}

pub mod configuration {
    pub mod clientbound {
        pub const DISCONNECT: i32 = 0x01;
        pub const FINISH: i32 = 0x02;
        pub const KEEP_ALIVE: i32 = 0x03;
        pub const PING: i32 = 0x04;
    }

    pub mod serverbound {
        pub const CLIENT_INFORMATION: i32 = 0x00;
        pub const FINISH_ACK: i32 = 0x02;
        pub const KEEP_ALIVE: i32 = 0x03;
        pub const PONG: i32 = 0x04;
    }
}

pub mod play {
    pub mod clientbound {
        pub const DISCONNECT: i32 = 0x1B;
        pub const KEEP_ALIVE: i32 = 0x24;
        pub const SYNC_PLAYER_POSITION: i32 = 0x3E;
    }

    pub mod serverbound {
        pub const ACCEPT_TELEPORTATION: i32 = 0x00;
        pub const CHAT_COMMAND: i32 = 0x04;
        pub const KEEP_ALIVE: i32 = 0x15;
    }
}
