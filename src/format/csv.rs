//! CSV output formatter

use crate::{Disassembly, DisassemblyError};
use super::DisassemblyFormatter;

fn csv_error(e: impl std::fmt::Display) -> DisassemblyError {
    DisassemblyError::Format(format!("CSV serialization error: {}", e))
}

impl DisassemblyFormatter for super::CsvFormatter {
    fn format(&self, disassembly: &Disassembly) -> Result<String, DisassemblyError> {
        let mut writer = ::csv::Writer::from_writer(Vec::new());

        writer
            .write_record(["offset", "size", "bytes", "mnemonic", "operands"])
            .map_err(csv_error)?;

        for insn in disassembly {
            // Operands like "cx, ax" contain commas; the writer quotes them
            writer
                .write_record([
                    format!("0x{:04x}", insn.addr),
                    insn.size.to_string(),
                    insn.hex_bytes(),
                    insn.mnemonic().to_string(),
                    insn.operands(),
                ])
                .map_err(csv_error)?;
        }

        let bytes = writer.into_inner().map_err(csv_error)?;
        String::from_utf8(bytes).map_err(csv_error)
    }
}
