/// Compute the checksum for a frame body (every byte from the flags through
/// the end of the payload, start marker excluded): the bitwise complement of
/// the byte sum modulo 256.
pub fn body_checksum(body: &[u8]) -> u8 {
    let sum = body.iter().fold(0u16, |acc, &b| (acc + u16::from(b)) % 256);
    !(sum as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_computes_checksum_for_a_wake_request() {
        let body = [0x0A, 0x13, 0x0D, 0x01];
        assert_eq!(body_checksum(&body), 0xD4);
    }

    #[test]
    fn it_computes_checksum_for_a_wake_response() {
        let body = [0x09, 0x13, 0x0D, 0x01, 0x00];
        assert_eq!(body_checksum(&body), 0xD5);
    }

    #[test]
    fn it_computes_checksum_for_an_led_request() {
        let body = [0x0A, 0x1A, 0x0E, 0x02, 0x00, 0x0E, 0xFF, 0x00, 0x00];
        assert_eq!(body_checksum(&body), 0xBE);
    }

    #[test]
    fn it_computes_checksum_for_a_roll_request() {
        let body = [0x0A, 0x16, 0x07, 0x03, 0x96, 0x00, 0xB4, 0x00];
        assert_eq!(body_checksum(&body), 0x8B);
    }

    #[test]
    fn it_wraps_the_sum_modulo_256() {
        // 0xFF * 4 = 1020, 1020 % 256 = 252
        let body = [0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(body_checksum(&body), !252u8);
    }
}
