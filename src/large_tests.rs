#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::{Duration, Instant};

    use tempfile::NamedTempFile;

    use crate::{
        config::TraceConfig,
        decoder::{DecodeError, Illegal},
        disassemble,
        format::OutputFormat,
        memory::Rom,
        symbols::Provenance,
        Address, Disassembly,
    };

    const RESET: Address = 0x0200;
    const HANDLER: Address = 0x0280;

    fn put(image: &mut [u8], at: Address, bytes: &[u8]) {
        let at = at as usize;
        image[at..at + bytes.len()].copy_from_slice(bytes);
    }

    /// A 4K firmware image: vectors, a CALLT table, a main loop that touches
    /// data and calls through every call form, and a few small subroutines.
    fn firmware() -> Vec<u8> {
        let mut image = vec![0u8; 0x1000];

        for slot in (0x0002..=0x003e).step_by(2) {
            put(&mut image, slot, &HANDLER.to_le_bytes());
        }
        put(&mut image, 0x0000, &RESET.to_le_bytes());
        put(&mut image, 0x0040, &[0x00, 0x04]);
        for slot in (0x0042..=0x007e).step_by(2) {
            put(&mut image, slot, &[0x10, 0x04]);
        }

        put(&mut image, RESET, &[
            0x4a,                   // 0200 DI
            0x64, 0x00, 0xfe,       // 0201 MOVW DE, #fe00
            0x09, 0xf0, 0x00, 0x09, // 0204 MOV A, !0900
            0x22, 0x30,             // 0208 MOV fe30, A
            0xe0,                   // 020a CALLT [0040]
            0x90, 0x00,             // 020b CALLF !0800
            0x28, 0x20, 0x04,       // 020d CALL !0420
            0x81, 0x04,             // 0210 BZ $0216
            0x05, 0x4e,             // 0212 BR HL
            0x00, 0x00,             // 0214 (unreached)
            0x2c, 0x00, 0x02,       // 0216 BR !0200
        ]);
        put(&mut image, HANDLER, &[0x57]); // RETI
        put(&mut image, 0x0400, &[0xb9, 0x05, 0x56]); // MOV A, #05 ; RET
        put(&mut image, 0x0410, &[0x56]); // RET
        put(&mut image, 0x0420, &[0x32, 0xfe, 0x56]); // DBNZ C, $0420 ; RET
        put(&mut image, 0x0500, &[0x04]); // illegal
        put(&mut image, 0x0800, &[0x56]); // RET
        put(&mut image, 0x0900, &[0x42]); // data

        image
    }

    fn config() -> TraceConfig {
        TraceConfig {
            entry_points: vec![0x0500],
            ..TraceConfig::default()
        }
    }

    // Helper function to load a ROM image the way the binary does
    fn load_firmware() -> Vec<u8> {
        let file = NamedTempFile::new().expect("Failed to create temp file");
        fs::write(file.path(), firmware()).expect("Failed to write ROM");

        let data = fs::read(file.path()).expect("Failed to read ROM");
        println!("ROM loaded, size: {} bytes", data.len());
        data
    }

    fn run() -> Disassembly {
        disassemble(Rom::new(load_firmware()), &config())
    }

    #[test]
    fn test_firmware_is_fully_traced() {
        let start = Instant::now();
        let disassembly = run();
        println!("Traced in {:?}", start.elapsed());

        let memory = &disassembly.memory;
        let starts: Vec<Address> = memory.instructions().map(|(addr, _)| addr).collect();
        assert_eq!(
            starts,
            vec![
                0x0200, 0x0201, 0x0204, 0x0208, 0x020a, 0x020b, 0x020d, 0x0210, 0x0212, 0x0216,
                0x0280, 0x0400, 0x0402, 0x0410, 0x0420, 0x0422, 0x0800,
            ]
        );

        assert!(memory.is_entry_point(RESET));
        assert!(memory.is_jump_target(RESET));
        assert!(memory.is_entry_point(HANDLER));
        assert!(memory.is_call_target(0x0400));
        assert!(memory.is_call_target(0x0410));
        assert!(memory.is_call_target(0x0420));
        assert!(memory.is_jump_target(0x0420));
        assert!(memory.is_call_target(0x0800));
        assert!(memory.is_unresolved_indirect(0x0212));
        assert!(memory.is_vector(0x0000));
        assert!(!memory.is_vector(0x002a));
        assert!(!memory.is_decoded(0x0214));
        assert!(!memory.is_decoded(0x0900));
    }

    #[test]
    fn test_firmware_report() {
        let disassembly = run();
        let report = &disassembly.report;

        assert_eq!(report.indirect, vec![0x0212]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].addr, 0x0500);
        assert!(matches!(
            report.failures[0].error,
            DecodeError::IllegalOpcode { reason: Illegal::NoMatch, .. }
        ));
        assert!(report.conflicts.is_empty());
        assert!(report.bad_vectors.is_empty());
        assert!(report.untraceable.is_empty());

        assert_eq!(disassembly.orphans.len(), 1);
        assert_eq!(disassembly.orphans[0].addr, 0x0500);
    }

    #[test]
    fn test_firmware_symbols() {
        let disassembly = run();
        let symbols = &disassembly.symbols;

        let expected = [
            (0x0000, "rst_vect", Provenance::Predefined),
            (0x0040, "callt_start", Provenance::Predefined),
            (0x0200, "lab_0200", Provenance::Code),
            (0x0216, "lab_0216", Provenance::Code),
            (0x0280, "lab_0280", Provenance::Code),
            (0x0400, "sub_0400", Provenance::Code),
            (0x0410, "sub_0410", Provenance::Code),
            (0x0420, "sub_0420", Provenance::Code),
            (0x0800, "callf_start", Provenance::Predefined),
            (0x0900, "mem_0900", Provenance::Data),
            (0xfe30, "mem_fe30", Provenance::Data),
        ];
        for (addr, name, provenance) in expected {
            let symbol = symbols
                .get(addr)
                .unwrap_or_else(|| panic!("no symbol at 0x{:04x}", addr));
            assert_eq!(symbol.name, name);
            assert_eq!(symbol.provenance, provenance);
        }
        assert!(!symbols.contains(0x0500));
        assert!(!symbols.contains(0x0214));
    }

    #[test]
    fn test_firmware_listing() {
        let disassembly = run();
        let config = config();
        let text = OutputFormat::Text
            .get_formatter()
            .format(&disassembly.listing(&config))
            .expect("Formatting failed");

        for line in [
            "    DW lab_0200",
            "    DW lab_0280",
            "lab_0200:\n    DI",
            "    MOVW DE, #fe00",
            "    MOV A, !mem_0900",
            "    MOV mem_fe30, A",
            "    CALLT [callt_start]:sub_0400",
            "    CALLF !callf_start",
            "    CALL !sub_0420",
            "    BZ $lab_0216",
            "    BR HL",
            "lab_0216:\n    BR !lab_0200",
            "lab_0280:\n    RETI",
            "sub_0420:\n    DBNZ C, $sub_0420",
            "mem_fe30            EQU 0xfe30",
            "; unresolved indirect: 0x0212: BR HL: destination unknown",
            "; decode failure: 0x0500: Illegal opcode 04 at 0x0500: no matching instruction",
        ] {
            assert!(text.contains(line), "listing is missing {:?}", line);
        }

        // The unreached padding is data.
        assert!(text.contains("    DB 0x00                         ; 0214: 00"));
        // Every byte of the image is listed exactly once.
        let listed: usize = text
            .lines()
            .filter_map(|line| line.split_once("; ").map(|(_, rest)| rest))
            .filter_map(|rest| rest.split_once(": ").map(|(_, bytes)| bytes))
            .filter(|bytes| {
                bytes
                    .split(' ')
                    .all(|b| b.len() == 2 && u8::from_str_radix(b, 16).is_ok())
            })
            .map(|bytes| bytes.split(' ').count())
            .sum();
        assert_eq!(listed, 0x1000);
    }

    #[test]
    fn test_output_formatting() {
        let disassembly = run();
        let config = config();
        let listing = disassembly.listing(&config);

        println!("Testing output formats...");
        for format in OutputFormat::available_formats() {
            println!("Testing format: {}", format);
            let start = Instant::now();
            let output = match format.get_formatter().format(&listing) {
                Ok(result) => result,
                Err(e) => panic!("Formatting failed for {}: {}", format, e),
            };
            println!("Formatting completed in {:?}", start.elapsed());

            assert!(!output.is_empty(), "Empty output for format {}", format);
            assert!(output.contains("sub_0420"), "{} output lacks symbols", format);
        }
    }

    #[test]
    fn test_identical_input_identical_output() {
        let config = config();
        let first = run();
        let second = run();

        assert_eq!(first.symbols, second.symbols);
        assert_eq!(first.report, second.report);
        assert_eq!(first.orphans, second.orphans);
        for format in OutputFormat::available_formats() {
            let a = format.get_formatter().format(&first.listing(&config)).unwrap();
            let b = format.get_formatter().format(&second.listing(&config)).unwrap();
            assert_eq!(a, b, "{} output differs between runs", format);
        }
    }

    #[test]
    fn test_noise_image_terminates() {
        // xorshift noise over the whole 64K space
        let mut state: u32 = 0x2545_f491;
        let image: Vec<u8> = (0..0x10000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            })
            .collect();

        let config = TraceConfig::default();
        let start = Instant::now();
        let disassembly = disassemble(Rom::new(image), &config);
        let elapsed = start.elapsed();
        println!(
            "Traced {} instructions with {} failures in {:?}",
            disassembly.memory.instruction_count(),
            disassembly.report.failures.len(),
            elapsed
        );
        assert!(elapsed < Duration::from_secs(30), "Trace took too long");

        // Placed instructions never overlap.
        let mut end = 0usize;
        for (addr, insn) in disassembly.memory.instructions() {
            assert!(addr as usize >= end, "instruction at 0x{:04x} overlaps", addr);
            end = addr as usize + insn.len();
        }

        for format in OutputFormat::available_formats() {
            assert!(format.get_formatter().format(&disassembly.listing(&config)).is_ok());
        }
    }
}
