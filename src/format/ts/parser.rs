use super::types::*;
use crate::error::{Result, TsAudioError};
use crate::utils::Crc32Mpeg2;

/// Stateless parser for the fixed parts of TS packets and PSI sections.
#[derive(Debug, Default, Clone, Copy)]
pub struct TSPacketParser;

impl TSPacketParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_header(&self, data: &[u8]) -> Result<TSHeader> {
        if data.len() < TS_HEADER_SIZE {
            return Err(TsAudioError::InvalidData("TS packet too short".into()));
        }

        if data[0] != TS_SYNC_BYTE {
            return Err(TsAudioError::InvalidData("Invalid sync byte".into()));
        }

        Ok(TSHeader {
            sync_byte: data[0],
            transport_error: (data[1] & 0x80) != 0,
            payload_unit_start: (data[1] & 0x40) != 0,
            transport_priority: (data[1] & 0x20) != 0,
            pid: (((data[1] & 0x1F) as u16) << 8) | data[2] as u16,
            scrambling_control: (data[3] >> 6) & 0x03,
            adaptation_field_exists: (data[3] & 0x20) != 0,
            contains_payload: (data[3] & 0x10) != 0,
            continuity_counter: data[3] & 0x0F,
        })
    }

    /// Parses the adaptation field starting at `offset` (its length byte).
    pub fn parse_adaptation_field(&self, data: &[u8], offset: usize) -> Result<AdaptationField> {
        let length = *data
            .get(offset)
            .ok_or_else(|| TsAudioError::InvalidData("Adaptation field missing".into()))?
            as usize;
        if data.len() < offset + length + 1 {
            return Err(TsAudioError::InvalidData("Adaptation field too short".into()));
        }

        let mut field = AdaptationField {
            length,
            discontinuity: false,
            random_access: false,
            pcr: None,
        };
        if length == 0 {
            return Ok(field);
        }

        let flags = data[offset + 1];
        field.discontinuity = (flags & 0x80) != 0;
        field.random_access = (flags & 0x40) != 0;

        let pos = offset + 2;
        if (flags & 0x10) != 0 && length >= 7 {
            let pcr_base = ((data[pos] as u64) << 25)
                | ((data[pos + 1] as u64) << 17)
                | ((data[pos + 2] as u64) << 9)
                | ((data[pos + 3] as u64) << 1)
                | ((data[pos + 4] & 0x80) as u64 >> 7);
            let pcr_ext = (((data[pos + 4] & 0x01) as u64) << 8) | (data[pos + 5] as u64);
            field.pcr = Some(pcr_base * 300 + pcr_ext);
        }

        Ok(field)
    }

    /// Splits a 188-byte packet into its header and payload. The payload is
    /// empty when the packet carries none.
    pub fn parse_packet<'a>(&self, data: &'a [u8]) -> Result<(TSHeader, &'a [u8])> {
        let header = self.parse_header(data)?;
        if !header.contains_payload {
            return Ok((header, &[]));
        }

        let mut payload_offset = TS_HEADER_SIZE;
        if header.adaptation_field_exists {
            let adaptation = self.parse_adaptation_field(data, payload_offset)?;
            payload_offset += adaptation.length + 1;
        }
        if payload_offset > data.len() {
            return Err(TsAudioError::InvalidData(
                "Adaptation field overruns packet".into(),
            ));
        }
        Ok((header, &data[payload_offset..]))
    }

    /// Validates a complete PSI section (table_id through CRC_32) and returns
    /// its table_id and the bytes between the fixed header and the CRC.
    pub fn parse_section<'a>(&self, section: &'a [u8]) -> Result<(u8, &'a [u8])> {
        if section.len() < 12 {
            return Err(TsAudioError::InvalidData("PSI section too short".into()));
        }
        let section_length = (((section[1] & 0x0F) as usize) << 8) | section[2] as usize;
        let total = 3 + section_length;
        if section_length < 9 || section.len() < total {
            return Err(TsAudioError::InvalidData(format!(
                "PSI section length {} out of range",
                section_length
            )));
        }
        let section = &section[..total];
        if !Crc32Mpeg2::verify_section(section) {
            return Err(TsAudioError::InvalidData(format!(
                "CRC mismatch in table 0x{:02x}",
                section[0]
            )));
        }
        Ok((section[0], &section[8..total - 4]))
    }

    pub fn parse_pat(&self, data: &[u8]) -> Result<PAT> {
        let mut pat = PAT::new();
        let mut pos = 0;

        while pos + 4 <= data.len() {
            let program_number = ((data[pos] as u16) << 8) | data[pos + 1] as u16;
            let pid = (((data[pos + 2] & 0x1F) as u16) << 8) | data[pos + 3] as u16;
            pat.entries.push(PATEntry {
                program_number,
                network_pid: if program_number == 0 { pid } else { 0 },
                program_map_pid: if program_number != 0 { pid } else { 0 },
            });
            pos += 4;
        }

        Ok(pat)
    }

    pub fn parse_pmt(&self, data: &[u8]) -> Result<PMT> {
        let mut pmt = PMT::new();
        let mut pos = 0;
        let end = data.len();

        if pos + 4 > end {
            return Err(TsAudioError::InvalidData("PMT too short".into()));
        }

        pmt.pcr_pid = ((data[pos] as u16 & 0x1F) << 8) | data[pos + 1] as u16;
        pos += 2;

        let program_info_length = ((data[pos] as usize & 0x0F) << 8) | data[pos + 1] as usize;
        pos += 2;

        if program_info_length > 0 {
            if pos + program_info_length > end {
                return Err(TsAudioError::InvalidData("Program info data too short".into()));
            }
            pmt.program_descriptors =
                self.parse_descriptors(&data[pos..pos + program_info_length])?;
            pos += program_info_length;
        }

        while pos + 5 <= end {
            let stream_type = data[pos];
            let elementary_pid = ((data[pos + 1] as u16 & 0x1F) << 8) | data[pos + 2] as u16;
            let es_info_length = ((data[pos + 3] as usize & 0x0F) << 8) | data[pos + 4] as usize;
            pos += 5;

            if pos + es_info_length > end {
                return Err(TsAudioError::InvalidData("ES info data too short".into()));
            }

            let descriptors = self.parse_descriptors(&data[pos..pos + es_info_length])?;
            pos += es_info_length;

            pmt.elementary_stream_infos.push(ElementaryStreamInfo {
                stream_type,
                elementary_pid,
                descriptors,
            });
        }

        Ok(pmt)
    }

    fn parse_descriptors(&self, data: &[u8]) -> Result<Vec<Descriptor>> {
        let mut descriptors = Vec::new();
        let mut pos = 0;

        while pos + 2 <= data.len() {
            let tag = data[pos];
            let length = data[pos + 1] as usize;
            pos += 2;

            if pos + length > data.len() {
                return Err(TsAudioError::InvalidData("Descriptor data too short".into()));
            }

            descriptors.push(Descriptor {
                tag,
                data: data[pos..pos + length].to_vec(),
            });
            pos += length;
        }

        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};
    use pretty_assertions::assert_eq;

    fn section(table_id: u8, body: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        buf.put_u8(table_id);
        buf.put_u16(0xB000 | (5 + body.len() + 4) as u16);
        buf.put_u16(1); // table id extension
        buf.put_u8(0xC1); // version 0, current
        buf.put_u8(0);
        buf.put_u8(0);
        buf.put_slice(body);
        let crc = Crc32Mpeg2::calculate(&buf);
        buf.put_u32(crc);
        buf.to_vec()
    }

    #[test]
    fn test_parse_ts_header() {
        let parser = TSPacketParser::new();
        let data = [
            0x47, // Sync byte
            0x40, // Payload unit start indicator set
            0x00, // PID (high bits)
            0x10, // Continuity counter
        ];

        let header = parser.parse_header(&data).unwrap();
        assert_eq!(header.sync_byte, 0x47);
        assert!(header.payload_unit_start);
        assert_eq!(header.pid, 0);
        assert_eq!(header.continuity_counter, 0x10 & 0x0F);
        assert!(parser.parse_header(&[0x48, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_payload_after_adaptation_field() {
        let parser = TSPacketParser::new();
        let mut packet = vec![0xFFu8; TS_PACKET_SIZE];
        packet[..4].copy_from_slice(&[0x47, 0x41, 0x00, 0x30]);
        packet[4] = 10; // adaptation field length
        packet[5] = 0x40; // random access
        packet[15] = 0xAB;

        let (header, payload) = parser.parse_packet(&packet).unwrap();
        assert_eq!(header.pid, 0x100);
        assert_eq!(payload.len(), TS_PACKET_SIZE - 15);
        assert_eq!(payload[0], 0xAB);

        let adaptation = parser.parse_adaptation_field(&packet, 4).unwrap();
        assert!(adaptation.random_access);
    }

    #[test]
    fn test_zero_length_adaptation_field() {
        let parser = TSPacketParser::new();
        let mut packet = vec![0u8; TS_PACKET_SIZE];
        packet[..5].copy_from_slice(&[0x47, 0x01, 0x00, 0x30, 0x00]);
        let (_, payload) = parser.parse_packet(&packet).unwrap();
        assert_eq!(payload.len(), TS_PACKET_SIZE - 5);
    }

    #[test]
    fn test_parse_pat_section() {
        let parser = TSPacketParser::new();
        let data = section(
            TABLE_ID_PAT,
            &[
                0x00, 0x00, 0xE0, 0x10, // network PID
                0x00, 0x01, 0xF0, 0x00, // program 1 -> 0x1000
            ],
        );

        let (table_id, body) = parser.parse_section(&data).unwrap();
        assert_eq!(table_id, TABLE_ID_PAT);
        let pat = parser.parse_pat(body).unwrap();
        assert_eq!(pat.entries.len(), 2);
        assert_eq!(pat.entries[0].network_pid, 0x10);
        assert_eq!(pat.first_program().unwrap().program_map_pid, 0x1000);
    }

    #[test]
    fn test_section_crc_mismatch() {
        let parser = TSPacketParser::new();
        let mut data = section(TABLE_ID_PAT, &[0x00, 0x01, 0xF0, 0x00]);
        data[9] ^= 0x01;
        assert!(parser.parse_section(&data).is_err());
    }

    #[test]
    fn test_parse_pmt_section() {
        let parser = TSPacketParser::new();
        let data = section(
            TABLE_ID_PMT,
            &[
                0xE1, 0x00, // PCR PID 0x100
                0xF0, 0x00, // no program info
                0x1B, 0xE1, 0x00, 0xF0, 0x00, // H.264 on 0x100
                0x0F, 0xE1, 0x01, 0xF0, 0x03, 0x0A, 0x01, 0x00, // AAC on 0x101, one descriptor
            ],
        );

        let (table_id, body) = parser.parse_section(&data).unwrap();
        assert_eq!(table_id, TABLE_ID_PMT);
        let pmt = parser.parse_pmt(body).unwrap();
        assert_eq!(pmt.pcr_pid, 0x100);
        assert_eq!(pmt.elementary_stream_infos.len(), 2);
        assert_eq!(pmt.elementary_stream_infos[1].descriptors[0].tag, 0x0A);
        assert_eq!(pmt.audio_tracks().len(), 1);
    }
}
