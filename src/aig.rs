//! And-inverter graphs and AIGER output.
//!
//! Signals follow the AIGER convention: a signal is `2 * var` with the
//! least-significant bit holding the negation, `0` is constant false and
//! `1` constant true. The builder folds constants eagerly, so trivial gates
//! never materialize.

use std::io::{self, Write};

pub(crate) const AIG_FALSE: u32 = 0;
pub(crate) const AIG_TRUE: u32 = 1;

pub(crate) fn negate(signal: u32) -> u32 {
    signal ^ 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AndGate {
    pub(crate) lhs: u32,
    pub(crate) rhs0: u32,
    pub(crate) rhs1: u32,
}

#[derive(Debug, Default, Clone)]
pub struct Aig {
    max_var: u32,
    inputs: Vec<(u32, Option<String>)>,
    outputs: Vec<(u32, Option<String>)>,
    ands: Vec<AndGate>,
}

impl Aig {
    /// Adds a primary input. All inputs must be created before the first
    /// gate, which keeps the variable numbering compatible with the binary
    /// AIGER format.
    pub(crate) fn new_input(&mut self, symbol: Option<String>) -> u32 {
        assert!(self.ands.is_empty(), "inputs must precede gates");
        self.max_var += 1;
        let signal = 2 * self.max_var;
        self.inputs.push((signal, symbol));
        signal
    }

    pub(crate) fn add_output(&mut self, signal: u32, symbol: Option<String>) {
        self.outputs.push((signal, symbol));
    }

    pub(crate) fn and(&mut self, i1: u32, i2: u32) -> u32 {
        if i1 == AIG_TRUE {
            return i2;
        }
        if i2 == AIG_TRUE {
            return i1;
        }
        if i1 == AIG_FALSE || i2 == AIG_FALSE {
            return AIG_FALSE;
        }
        if i1 == i2 {
            return i1;
        }
        if i1 == negate(i2) {
            return AIG_FALSE;
        }
        self.max_var += 1;
        let lhs = 2 * self.max_var;
        // the binary format requires rhs0 >= rhs1
        let (rhs0, rhs1) = if i1 >= i2 { (i1, i2) } else { (i2, i1) };
        self.ands.push(AndGate { lhs, rhs0, rhs1 });
        lhs
    }

    pub(crate) fn or(&mut self, i1: u32, i2: u32) -> u32 {
        negate(self.and(negate(i1), negate(i2)))
    }

    pub(crate) fn multi_and(&mut self, signals: &[u32]) -> u32 {
        signals.iter().fold(AIG_TRUE, |acc, &signal| self.and(acc, signal))
    }

    pub(crate) fn multi_or(&mut self, signals: &[u32]) -> u32 {
        signals.iter().fold(AIG_FALSE, |acc, &signal| self.or(acc, signal))
    }

    pub(crate) fn mux(&mut self, selector: u32, if_signal: u32, else_signal: u32) -> u32 {
        let if_branch = self.and(selector, if_signal);
        let else_branch = self.and(negate(selector), else_signal);
        self.or(if_branch, else_branch)
    }

    pub(crate) fn inputs(&self) -> &[(u32, Option<String>)] {
        &self.inputs
    }

    pub(crate) fn outputs(&self) -> &[(u32, Option<String>)] {
        &self.outputs
    }

    pub(crate) fn ands(&self) -> &[AndGate] {
        &self.ands
    }

    /// Writes the circuit in the ASCII `aag` format.
    ///
    /// # Errors
    ///
    /// Propagates IO failures of the writer.
    pub fn write_ascii<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(
            writer,
            "aag {} {} 0 {} {}",
            self.max_var,
            self.inputs.len(),
            self.outputs.len(),
            self.ands.len()
        )?;
        for (signal, _) in &self.inputs {
            writeln!(writer, "{signal}")?;
        }
        for (signal, _) in &self.outputs {
            writeln!(writer, "{signal}")?;
        }
        for gate in &self.ands {
            writeln!(writer, "{} {} {}", gate.lhs, gate.rhs0, gate.rhs1)?;
        }
        self.write_symbols(writer)
    }

    /// Writes the circuit in the binary `aig` format.
    ///
    /// Gates are written as delta-encoded varints; this relies on inputs
    /// preceding gates in the variable order, which the builder enforces.
    ///
    /// # Errors
    ///
    /// Propagates IO failures of the writer.
    pub fn write_binary<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(
            writer,
            "aig {} {} 0 {} {}",
            self.max_var,
            self.inputs.len(),
            self.outputs.len(),
            self.ands.len()
        )?;
        for (signal, _) in &self.outputs {
            writeln!(writer, "{signal}")?;
        }
        for (idx, gate) in self.ands.iter().enumerate() {
            let expected_lhs = 2 * (self.inputs.len() as u32 + idx as u32 + 1);
            assert_eq!(gate.lhs, expected_lhs, "gates are contiguous");
            write_varint(writer, gate.lhs - gate.rhs0)?;
            write_varint(writer, gate.rhs0 - gate.rhs1)?;
        }
        self.write_symbols(writer)
    }

    fn write_symbols<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for (idx, (_, symbol)) in self.inputs.iter().enumerate() {
            if let Some(symbol) = symbol {
                writeln!(writer, "i{idx} {symbol}")?;
            }
        }
        for (idx, (_, symbol)) in self.outputs.iter().enumerate() {
            if let Some(symbol) = symbol {
                writeln!(writer, "o{idx} {symbol}")?;
            }
        }
        Ok(())
    }
}

fn write_varint<W: Write>(writer: &mut W, mut value: u32) -> io::Result<()> {
    while value & !0x7f != 0 {
        writer.write_all(&[(value & 0x7f) as u8 | 0x80])?;
        value >>= 7;
    }
    writer.write_all(&[value as u8])
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn constant_folding() {
        let mut aig = Aig::default();
        let x = aig.new_input(None);
        assert_eq!(aig.and(x, AIG_TRUE), x);
        assert_eq!(aig.and(AIG_FALSE, x), AIG_FALSE);
        assert_eq!(aig.and(x, x), x);
        assert_eq!(aig.and(x, negate(x)), AIG_FALSE);
        assert_eq!(aig.or(x, AIG_FALSE), x);
        assert!(aig.ands().is_empty());
    }

    #[test]
    fn mux_selects() {
        let mut aig = Aig::default();
        let s = aig.new_input(None);
        let a = aig.new_input(None);
        let b = aig.new_input(None);
        let out = aig.mux(s, a, b);
        assert_ne!(out, AIG_FALSE);
        // (s & a), (!s & b), !( !(s&a) & !(!s&b) )
        assert_eq!(aig.ands().len(), 3);
    }

    #[test]
    fn ascii_negated_passthrough() {
        // output y = !x
        let mut aig = Aig::default();
        let x = aig.new_input(Some("x".to_owned()));
        aig.add_output(negate(x), Some("y".to_owned()));

        let mut buffer = Vec::new();
        aig.write_ascii(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "aag 1 1 0 1 0\n2\n3\ni0 x\no0 y\n");
    }

    #[test]
    fn binary_single_and() {
        // output = x1 & x2
        let mut aig = Aig::default();
        let x1 = aig.new_input(None);
        let x2 = aig.new_input(None);
        let out = aig.and(x1, x2);
        aig.add_output(out, None);

        let mut buffer = Vec::new();
        aig.write_binary(&mut buffer).unwrap();
        // lhs = 6, rhs0 = 4, rhs1 = 2 => deltas 2 and 2
        assert_eq!(buffer, b"aig 3 2 0 1 1\n6\n\x02\x02");
    }

    #[test]
    fn varint_encoding() {
        let mut buffer = Vec::new();
        write_varint(&mut buffer, 0).unwrap();
        write_varint(&mut buffer, 127).unwrap();
        write_varint(&mut buffer, 128).unwrap();
        assert_eq!(buffer, [0x00, 0x7f, 0x80, 0x01]);
    }
}
