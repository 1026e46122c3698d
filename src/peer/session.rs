use std::net::TcpStream;
use std::sync::Arc;

use crate::logger::LoggerSender;
use crate::net::transport::{self, TransportError};
use crate::piece::manager::{PieceManager, SchedulerError};

use super::wire::{Bitfield, Handshake, Message, MessageId, WireError};
use super::PeerEndpoint;

#[derive(Debug)]
pub enum SessionError {
    Transport(TransportError),
    Wire(WireError),
    Scheduler(SchedulerError),
    InfoHashMismatch,
    PeerHashMismatch,
    ProtocolViolation,
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        SessionError::Transport(err)
    }
}

impl From<WireError> for SessionError {
    fn from(err: WireError) -> Self {
        SessionError::Wire(err)
    }
}

impl From<SchedulerError> for SessionError {
    fn from(err: SchedulerError) -> Self {
        SessionError::Scheduler(err)
    }
}

/// Our view of a single connection's negotiated state.
#[derive(Debug)]
struct SessionStatus {
    choked: bool,
    interested: bool,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            choked: true,
            interested: false,
        }
    }
}

/// One worker's connection to a single remote peer: dials, handshakes,
/// registers with the shared `PieceManager`, then alternates between
/// requesting the scheduler's next block and servicing incoming messages
/// until the peer disconnects, misbehaves, or the download completes.
pub struct PeerSession {
    endpoint: PeerEndpoint,
    info_hash: [u8; 20],
    my_peer_id: [u8; 20],
    peer_id: [u8; 20],
    manager: Arc<PieceManager>,
    logger: LoggerSender,
    status: SessionStatus,
    outstanding_request: Option<(u32, u32, u32)>,
}

impl PeerSession {
    pub fn new(
        endpoint: PeerEndpoint,
        info_hash: [u8; 20],
        my_peer_id: [u8; 20],
        manager: Arc<PieceManager>,
        logger: LoggerSender,
    ) -> Self {
        Self {
            endpoint,
            info_hash,
            my_peer_id,
            peer_id: [0u8; 20],
            manager,
            logger,
            status: SessionStatus::default(),
            outstanding_request: None,
        }
    }

    /// Drives the session to completion. Always unregisters the peer from
    /// the scheduler before returning, success or failure.
    pub fn run(&mut self) -> Result<(), SessionError> {
        let result = self.run_inner();
        self.manager.remove_peer(self.peer_id);
        result
    }

    fn run_inner(&mut self) -> Result<(), SessionError> {
        let mut stream = transport::create_connection(self.endpoint.ip, self.endpoint.port)?;

        self.send_handshake(&mut stream)?;
        self.receive_handshake(&mut stream)?;
        self.logger.info(&format!(
            "handshake ok with {}:{}",
            self.endpoint.ip, self.endpoint.port
        ));

        let bitfield = self.receive_initial_bitfield(&mut stream)?;
        self.manager.add_peer(self.peer_id, bitfield)?;

        self.send_interested(&mut stream)?;

        while !self.manager.is_complete() {
            let frame = transport::receive_frame(&mut stream)?;
            match Message::from_frame(&frame)? {
                None => continue,
                Some(message) => self.handle_message(message)?,
            }

            if !self.status.choked && self.status.interested && self.outstanding_request.is_none()
            {
                self.issue_next_request(&mut stream)?;
            }
        }
        Ok(())
    }

    fn send_handshake(&self, stream: &mut TcpStream) -> Result<(), SessionError> {
        let handshake = Handshake::new(self.info_hash, self.my_peer_id);
        transport::send_data(stream, &handshake.to_bytes())?;
        Ok(())
    }

    fn receive_handshake(&mut self, stream: &mut TcpStream) -> Result<(), SessionError> {
        let mut buffer = [0u8; 68];
        transport::receive_exact(stream, &mut buffer)?;
        let handshake = Handshake::from_bytes(&buffer)?;
        if handshake.info_hash != self.info_hash {
            return Err(SessionError::InfoHashMismatch);
        }
        self.peer_id = handshake.peer_id;
        Ok(())
    }

    fn receive_initial_bitfield(&mut self, stream: &mut TcpStream) -> Result<Bitfield, SessionError> {
        let frame = transport::receive_frame(stream)?;
        match Message::from_frame(&frame)? {
            Some(message) if message.id == MessageId::Bitfield => {
                Ok(Bitfield::new(message.payload))
            }
            Some(_) => Err(SessionError::ProtocolViolation),
            None => Ok(Bitfield::empty(self.manager.total_pieces())),
        }
    }

    fn send_interested(&mut self, stream: &mut TcpStream) -> Result<(), SessionError> {
        transport::send_data(stream, &Message::interested().to_frame())?;
        self.status.interested = true;
        Ok(())
    }

    fn issue_next_request(&mut self, stream: &mut TcpStream) -> Result<(), SessionError> {
        let Some((index, offset, length)) = self.manager.next_request(self.peer_id) else {
            return Ok(());
        };
        transport::send_data(stream, &Message::request(index, offset, length).to_frame())?;
        self.outstanding_request = Some((index, offset, length));
        Ok(())
    }

    fn handle_message(&mut self, message: Message) -> Result<(), SessionError> {
        match message.id {
            MessageId::Choke => self.status.choked = true,
            MessageId::Unchoke => self.status.choked = false,
            MessageId::Have => {
                if let Some(index) = message.parse_have_payload() {
                    self.manager.update_peer(self.peer_id, index)?;
                }
            }
            MessageId::Bitfield => {
                self.manager.add_peer(self.peer_id, Bitfield::new(message.payload))?;
            }
            MessageId::Piece => {
                let Some((index, offset, data)) = message.parse_piece_payload() else {
                    return Ok(());
                };
                self.outstanding_request = None;
                self.manager.block_received(index, offset, data.to_vec())?;
            }
            MessageId::NotInterested
            | MessageId::Request
            | MessageId::Cancel
            | MessageId::Port
            | MessageId::Interested => {}
        }
        Ok(())
    }
}
