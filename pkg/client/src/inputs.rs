use accumulator::TREE_DEPTH;
use serde::{Deserialize, Serialize};
use zk_primitives::{Element, PublicInputs};

/// One input slot of the spend circuit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputNote {
    pub value: Element,
    pub secret: Element,
    pub owner: Element,
    pub leaf_index: u64,
    /// Sibling hashes from the leaf up
    pub path: [Element; TREE_DEPTH],
    /// `1` where the path node is a right child
    pub dirs: [u8; TREE_DEPTH],
    /// Dummy inputs fill an unused slot and are not checked against the root
    pub is_dummy: bool,
}

/// One output slot of the spend circuit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNote {
    pub value: Element,
    pub secret: Element,
    pub owner: Element,
    pub viewing_key: Element,
}

/// Everything the prover needs for one spend: two inputs, two outputs and the public inputs
/// they produce
///
/// Serialises to the flat JSON object the prove server reads. Field elements are `0x` hex,
/// leaf indices and direction bits are decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "FlatInputs", try_from = "FlatInputs")]
pub struct CircuitInputs {
    pub public: PublicInputs,
    pub inputs: [InputNote; 2],
    pub outputs: [OutputNote; 2],
}

impl CircuitInputs {
    #[must_use]
    pub fn public_inputs(&self) -> &PublicInputs {
        &self.public
    }

    /// Input slots that spend a real note
    pub fn real_inputs(&self) -> impl Iterator<Item = &InputNote> {
        self.inputs.iter().filter(|input| !input.is_dummy)
    }
}

#[derive(Serialize, Deserialize)]
pub struct FlatInputs {
    merkle_root: Element,
    nullifier_1: Element,
    nullifier_2: Element,
    out_commitment_1: Element,
    out_commitment_2: Element,
    fee: Element,
    relayer: Element,
    encrypted_value_1: Element,
    encrypted_value_2: Element,

    in_value_1: Element,
    in_secret_1: Element,
    in_owner_1: Element,
    in_leaf_index_1: String,
    in_path_1: Vec<Element>,
    in_dirs_1: Vec<String>,
    in_is_dummy_1: String,

    in_value_2: Element,
    in_secret_2: Element,
    in_owner_2: Element,
    in_leaf_index_2: String,
    in_path_2: Vec<Element>,
    in_dirs_2: Vec<String>,
    in_is_dummy_2: String,

    out_value_1: Element,
    out_secret_1: Element,
    out_owner_1: Element,

    out_value_2: Element,
    out_secret_2: Element,
    out_owner_2: Element,

    out_viewing_key_1: Element,
    out_viewing_key_2: Element,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid circuit inputs: {0}")]
pub struct InvalidInputs(String);

fn parse<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, InvalidInputs> {
    value
        .parse()
        .map_err(|_| InvalidInputs(format!("{field}: {value:?} is not a decimal integer")))
}

#[allow(clippy::too_many_arguments)]
fn parse_input(
    slot: usize,
    value: Element,
    secret: Element,
    owner: Element,
    leaf_index: &str,
    path: Vec<Element>,
    dirs: &[String],
    is_dummy: &str,
) -> Result<InputNote, InvalidInputs> {
    let path_len = path.len();
    let path = path.try_into().map_err(|_| {
        InvalidInputs(format!(
            "in_path_{slot}: expected {TREE_DEPTH} siblings, got {path_len}"
        ))
    })?;

    let dirs = dirs
        .iter()
        .map(|bit| match bit.as_str() {
            "0" => Ok(0),
            "1" => Ok(1),
            _ => Err(InvalidInputs(format!("in_dirs_{slot}: {bit:?} is not a bit"))),
        })
        .collect::<Result<Vec<u8>, _>>()?;
    let dirs_len = dirs.len();
    let dirs = dirs.try_into().map_err(|_| {
        InvalidInputs(format!(
            "in_dirs_{slot}: expected {TREE_DEPTH} bits, got {dirs_len}"
        ))
    })?;

    Ok(InputNote {
        value,
        secret,
        owner,
        leaf_index: parse(&format!("in_leaf_index_{slot}"), leaf_index)?,
        path,
        dirs,
        is_dummy: parse::<u8>(&format!("in_is_dummy_{slot}"), is_dummy)? != 0,
    })
}

impl TryFrom<FlatInputs> for CircuitInputs {
    type Error = InvalidInputs;

    fn try_from(flat: FlatInputs) -> Result<Self, Self::Error> {
        let input_1 = parse_input(
            1,
            flat.in_value_1,
            flat.in_secret_1,
            flat.in_owner_1,
            &flat.in_leaf_index_1,
            flat.in_path_1,
            &flat.in_dirs_1,
            &flat.in_is_dummy_1,
        )?;
        let input_2 = parse_input(
            2,
            flat.in_value_2,
            flat.in_secret_2,
            flat.in_owner_2,
            &flat.in_leaf_index_2,
            flat.in_path_2,
            &flat.in_dirs_2,
            &flat.in_is_dummy_2,
        )?;

        Ok(Self {
            public: PublicInputs {
                merkle_root: flat.merkle_root,
                nullifier_1: flat.nullifier_1,
                nullifier_2: flat.nullifier_2,
                out_commitment_1: flat.out_commitment_1,
                out_commitment_2: flat.out_commitment_2,
                fee: flat.fee,
                relayer: flat.relayer,
                encrypted_value_1: flat.encrypted_value_1,
                encrypted_value_2: flat.encrypted_value_2,
            },
            inputs: [input_1, input_2],
            outputs: [
                OutputNote {
                    value: flat.out_value_1,
                    secret: flat.out_secret_1,
                    owner: flat.out_owner_1,
                    viewing_key: flat.out_viewing_key_1,
                },
                OutputNote {
                    value: flat.out_value_2,
                    secret: flat.out_secret_2,
                    owner: flat.out_owner_2,
                    viewing_key: flat.out_viewing_key_2,
                },
            ],
        })
    }
}

impl From<CircuitInputs> for FlatInputs {
    fn from(inputs: CircuitInputs) -> Self {
        let CircuitInputs {
            public,
            inputs: [in_1, in_2],
            outputs: [out_1, out_2],
        } = inputs;

        let dirs = |dirs: [u8; TREE_DEPTH]| dirs.iter().map(u8::to_string).collect();
        let bit = |flag: bool| u8::from(flag).to_string();

        Self {
            merkle_root: public.merkle_root,
            nullifier_1: public.nullifier_1,
            nullifier_2: public.nullifier_2,
            out_commitment_1: public.out_commitment_1,
            out_commitment_2: public.out_commitment_2,
            fee: public.fee,
            relayer: public.relayer,
            encrypted_value_1: public.encrypted_value_1,
            encrypted_value_2: public.encrypted_value_2,

            in_value_1: in_1.value,
            in_secret_1: in_1.secret,
            in_owner_1: in_1.owner,
            in_leaf_index_1: in_1.leaf_index.to_string(),
            in_path_1: in_1.path.to_vec(),
            in_dirs_1: dirs(in_1.dirs),
            in_is_dummy_1: bit(in_1.is_dummy),

            in_value_2: in_2.value,
            in_secret_2: in_2.secret,
            in_owner_2: in_2.owner,
            in_leaf_index_2: in_2.leaf_index.to_string(),
            in_path_2: in_2.path.to_vec(),
            in_dirs_2: dirs(in_2.dirs),
            in_is_dummy_2: bit(in_2.is_dummy),

            out_value_1: out_1.value,
            out_secret_1: out_1.secret,
            out_owner_1: out_1.owner,

            out_value_2: out_2.value,
            out_secret_2: out_2.secret,
            out_owner_2: out_2.owner,

            out_viewing_key_1: out_1.viewing_key,
            out_viewing_key_2: out_2.viewing_key,
        }
    }
}
