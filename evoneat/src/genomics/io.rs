//! Reader and writer for the seed-genome text format: one record per
//! line, whitespace-separated, delimited by `genomestart <id>` and
//! `genomeend <id>`.

use super::{Gene, Genome, GenomeParseError, NeuronType, NodeGene, Trait, TRAIT_PARAM_COUNT};
use crate::networks::ActivationKind;

use std::io::{self, BufRead, Write};

impl Genome {
    /// Reads a single genome from its text representation.
    ///
    /// Records are `trait`, `node`, and `gene` lines between a
    /// `genomestart`/`genomeend` pair. Lines wrapped in `/* ... */` are
    /// skipped, so species headers in population dumps parse cleanly.
    ///
    /// # Errors
    /// Returns an error on I/O failure, malformed records, a missing
    /// `genomeend`, or if the assembled genome violates a structural
    /// invariant.
    ///
    /// # Examples
    /// ```
    /// use evoneat::genomics::Genome;
    ///
    /// let text = "\
    /// genomestart 1
    /// trait 1 0.1 0 0 0 0 0 0 0
    /// node 1 0 1 1
    /// node 2 0 1 3
    /// node 3 0 0 2
    /// gene 1 1 3 1.5 false 1 0 true
    /// gene 1 2 3 -0.5 false 2 0 true
    /// genomeend 1
    /// ";
    /// let genome = Genome::read(text.as_bytes()).unwrap();
    /// assert_eq!(genome.id(), 1);
    /// assert_eq!(genome.nodes().count(), 3);
    /// assert_eq!(genome.genes().count(), 2);
    /// ```
    pub fn read<R: BufRead>(reader: R) -> Result<Genome, GenomeParseError> {
        let mut lines = reader
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l));
        match Genome::read_next(&mut lines)? {
            Some(genome) => Ok(genome),
            None => Err(GenomeParseError::UnexpectedEof),
        }
    }

    /// Reads the next genome from a numbered line stream, or `None` when
    /// the stream ends before a `genomestart` record.
    pub(crate) fn read_next(
        lines: &mut impl Iterator<Item = (usize, io::Result<String>)>,
    ) -> Result<Option<Genome>, GenomeParseError> {
        let mut id = None;
        let mut traits = Vec::new();
        let mut nodes = Vec::new();
        let mut genes = Vec::new();

        for (line_number, line) in lines {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || (line.starts_with("/*") && line.ends_with("*/")) {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            match fields[0] {
                "genomestart" => {
                    id = Some(parse_field::<usize>(&fields, 1, line_number, "genome id")?);
                }
                "trait" if id.is_some() => {
                    traits.push(parse_trait(&fields, line_number)?);
                }
                "node" if id.is_some() => {
                    nodes.push(parse_node(&fields, line_number)?);
                }
                "gene" if id.is_some() => {
                    genes.push(parse_gene(&fields, line_number)?);
                }
                "genomeend" => {
                    let end_id = parse_field::<usize>(&fields, 1, line_number, "genome id")?;
                    let id = id.ok_or_else(|| {
                        GenomeParseError::bad_record(line_number, "genomeend before genomestart")
                    })?;
                    if end_id != id {
                        return Err(GenomeParseError::bad_record(
                            line_number,
                            format!("genomeend id {} does not match genomestart {}", end_id, id),
                        ));
                    }
                    return Ok(Some(Genome::new(id, traits, nodes, genes)?));
                }
                record => {
                    return Err(GenomeParseError::bad_record(
                        line_number,
                        format!("unexpected record {:?}", record),
                    ));
                }
            }
        }

        if id.is_some() {
            Err(GenomeParseError::UnexpectedEof)
        } else {
            Ok(None)
        }
    }

    /// Writes the genome in the text format accepted by [`Genome::read`].
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "genomestart {}", self.id)?;
        for t in &self.traits {
            write!(writer, "trait {}", t.id())?;
            for p in t.params() {
                write!(writer, " {}", p)?;
            }
            writeln!(writer)?;
        }
        for n in &self.nodes {
            writeln!(
                writer,
                "node {} {} {} {}",
                n.id(),
                n.trait_id().unwrap_or(0),
                if n.is_sensor() { 1 } else { 0 },
                n.neuron_type().code(),
            )?;
        }
        for g in &self.genes {
            writeln!(
                writer,
                "gene {} {} {} {} {} {} {} {}",
                g.trait_id().unwrap_or(0),
                g.in_node(),
                g.out_node(),
                g.weight(),
                g.recurrent(),
                g.innovation(),
                g.mutation_num(),
                g.enabled(),
            )?;
        }
        writeln!(writer, "genomeend {}", self.id)?;
        Ok(())
    }
}

fn parse_field<T: std::str::FromStr>(
    fields: &[&str],
    index: usize,
    line: usize,
    what: &str,
) -> Result<T, GenomeParseError> {
    fields
        .get(index)
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| GenomeParseError::bad_record(line, format!("bad or missing {}", what)))
}

fn parse_bool(fields: &[&str], index: usize, line: usize, what: &str) -> Result<bool, GenomeParseError> {
    match fields.get(index) {
        Some(&"true") | Some(&"1") => Ok(true),
        Some(&"false") | Some(&"0") => Ok(false),
        _ => Err(GenomeParseError::bad_record(
            line,
            format!("bad or missing {}", what),
        )),
    }
}

fn parse_trait(fields: &[&str], line: usize) -> Result<Trait, GenomeParseError> {
    let id = parse_field::<usize>(fields, 1, line, "trait id")?;
    let mut params = [0.0; TRAIT_PARAM_COUNT];
    for (i, p) in params.iter_mut().enumerate() {
        *p = parse_field::<f64>(fields, 2 + i, line, "trait parameter")?;
    }
    Ok(Trait::new(id, params))
}

fn parse_node(fields: &[&str], line: usize) -> Result<NodeGene, GenomeParseError> {
    let id = parse_field::<usize>(fields, 1, line, "node id")?;
    let trait_id = parse_field::<usize>(fields, 2, line, "node trait id")?;
    // Field 3 (sensor/neuron) is implied by the neuron type and only
    // retained for format compatibility.
    let _ = parse_field::<u8>(fields, 3, line, "node type")?;
    let neuron_code = parse_field::<u8>(fields, 4, line, "neuron type")?;
    let neuron_type = NeuronType::from_code(neuron_code)
        .ok_or_else(|| GenomeParseError::bad_record(line, format!("bad neuron type {}", neuron_code)))?;
    Ok(NodeGene::new(id, neuron_type)
        .with_activation(ActivationKind::SigmoidSteepened)
        .with_trait(if trait_id == 0 { None } else { Some(trait_id) }))
}

fn parse_gene(fields: &[&str], line: usize) -> Result<Gene, GenomeParseError> {
    let trait_id = parse_field::<usize>(fields, 1, line, "gene trait id")?;
    let in_node = parse_field::<usize>(fields, 2, line, "gene source")?;
    let out_node = parse_field::<usize>(fields, 3, line, "gene target")?;
    let weight = parse_field::<f64>(fields, 4, line, "gene weight")?;
    let recurrent = parse_bool(fields, 5, line, "gene recurrent flag")?;
    let innovation = parse_field::<usize>(fields, 6, line, "gene innovation")?;
    let mutation_num = parse_field::<f64>(fields, 7, line, "gene mutation number")?;
    let enabled = parse_bool(fields, 8, line, "gene enable flag")?;
    Ok(Gene::new(innovation, in_node, out_node, weight, recurrent)
        .with_trait(if trait_id == 0 { None } else { Some(trait_id) })
        .with_mutation_num(mutation_num)
        .with_enabled(enabled))
}

#[cfg(test)]
mod tests {
    use super::*;

    const XOR_SEED: &str = "\
genomestart 1
trait 1 0.1 0 0 0 0 0 0 0
node 1 1 1 1
node 2 1 1 1
node 3 1 1 3
node 4 1 0 2
gene 1 1 4 0.0 false 1 0 true
gene 1 2 4 0.0 false 2 0 true
gene 1 3 4 0.0 false 3 0 true
genomeend 1
";

    #[test]
    fn read_xor_seed() {
        let genome = Genome::read(XOR_SEED.as_bytes()).unwrap();
        assert_eq!(genome.id(), 1);
        assert_eq!(genome.nodes().count(), 4);
        assert_eq!(genome.genes().count(), 3);
        assert_eq!(
            genome.nodes().filter(|n| n.is_sensor()).count(),
            3,
            "two inputs and one bias"
        );
        assert_eq!(
            genome.node(3).unwrap().neuron_type(),
            NeuronType::Bias
        );
    }

    #[test]
    fn write_read_round_trip() {
        let genome = Genome::read(XOR_SEED.as_bytes()).unwrap();
        let mut buffer = Vec::new();
        genome.write(&mut buffer).unwrap();
        let restored = Genome::read(buffer.as_slice()).unwrap();
        assert_eq!(genome, restored);
    }

    #[test]
    fn missing_genomeend_is_rejected() {
        let text = "genomestart 1\nnode 1 0 1 1\n";
        assert!(matches!(
            Genome::read(text.as_bytes()),
            Err(GenomeParseError::UnexpectedEof)
        ));
    }

    #[test]
    fn mismatched_end_id_is_rejected() {
        let text = "genomestart 1\ngenomeend 2\n";
        assert!(matches!(
            Genome::read(text.as_bytes()),
            Err(GenomeParseError::BadRecord { .. })
        ));
    }

    #[test]
    fn species_headers_are_skipped() {
        let text = format!("/* Species 4 */\n{}", XOR_SEED);
        let genome = Genome::read(text.as_bytes()).unwrap();
        assert_eq!(genome.id(), 1);
    }

    #[test]
    fn invalid_parsed_genome_is_rejected() {
        // Gene references node 9, which does not exist.
        let text = "\
genomestart 1
node 1 0 1 1
node 4 0 0 2
gene 0 1 9 1.0 false 1 0 true
genomeend 1
";
        assert!(matches!(
            Genome::read(text.as_bytes()),
            Err(GenomeParseError::Invalid(_))
        ));
    }
}
