//! Columnar encoder: an Arrow IPC stream built batch by batch.
//!
//! ```text
//! Uninitialized --first batch--> HeaderWritten --data frame--> Streaming --finish--> Closed
//! ```
//!
//! The schema message is emitted as its own frame, each batch becomes one
//! record-batch frame, and `finish` emits the end-of-stream trailer. A stream
//! that never saw a row is closed with an empty-schema header followed by the
//! trailer, which Arrow readers accept as a valid stream with no batches.
//!
//! All frames are written into the IPC writer's single output buffer and
//! copied out before the next write, so emitted chunks never share storage.

use std::num::NonZeroUsize;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryBuilder, BooleanBuilder, Float64Builder, Int64Builder, NullArray,
    StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema, SchemaRef};
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use super::accumulator::Batch;
use super::errors::{EncodeError, EncodeResult};
use super::format::{FrameEncoder, SchemaPolicy};
use super::schema::{Schema, SchemaField, SchemaInferencer};
use crate::observability::{log_event_with_fields, Event};
use crate::row::{Value, ValueKind};

/// Externally visible encoder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnarPhase {
    Uninitialized,
    HeaderWritten,
    Streaming,
    Closed,
}

enum State {
    Uninitialized,
    Open(Box<OpenStream>),
    Closed,
}

/// Everything that exists once the schema is frozen.
struct OpenStream {
    schema: Arc<Schema>,
    arrow_schema: SchemaRef,
    writer: StreamWriter<Vec<u8>>,
    columns: Vec<ColumnBuilder>,
    batches_written: u64,
}

pub struct ColumnarEncoder {
    policy: SchemaPolicy,
    state: State,
    dropped_fields: u64,
}

impl ColumnarEncoder {
    pub fn new(policy: SchemaPolicy) -> Self {
        Self {
            policy,
            state: State::Uninitialized,
            dropped_fields: 0,
        }
    }

    pub fn phase(&self) -> ColumnarPhase {
        match &self.state {
            State::Uninitialized => ColumnarPhase::Uninitialized,
            State::Open(stream) if stream.batches_written == 0 => ColumnarPhase::HeaderWritten,
            State::Open(_) => ColumnarPhase::Streaming,
            State::Closed => ColumnarPhase::Closed,
        }
    }

    /// The frozen schema, once the first batch has been seen
    pub fn schema(&self) -> Option<&Arc<Schema>> {
        match &self.state {
            State::Open(stream) => Some(&stream.schema),
            _ => None,
        }
    }
}

impl OpenStream {
    /// Freeze `schema`, write the schema message and drain it as the header frame.
    fn start(schema: Schema, frames: &mut Vec<Vec<u8>>) -> EncodeResult<Self> {
        let columns = schema
            .fields()
            .iter()
            .map(ColumnBuilder::for_field)
            .collect::<EncodeResult<Vec<_>>>()?;
        let arrow_fields: Vec<Field> = schema
            .fields()
            .iter()
            .map(|f| Field::new(f.name.as_ref(), arrow_type(f.kind), true))
            .collect();
        let arrow_schema: SchemaRef = Arc::new(ArrowSchema::new(arrow_fields));

        let mut writer = StreamWriter::try_new(Vec::new(), &arrow_schema)?;
        frames.push(drain(&mut writer));

        Ok(Self {
            schema: Arc::new(schema),
            arrow_schema,
            writer,
            columns,
            batches_written: 0,
        })
    }

    fn write_batch(
        &mut self,
        batch: &Batch,
        policy: SchemaPolicy,
        dropped: &mut u64,
        frames: &mut Vec<Vec<u8>>,
    ) -> EncodeResult<()> {
        let record_batch = self.build(batch, policy, dropped)?;
        self.writer.write(&record_batch)?;
        frames.push(drain(&mut self.writer));
        self.batches_written += 1;
        Ok(())
    }

    /// Coerce every row of `batch` to the frozen schema.
    fn build(
        &mut self,
        batch: &Batch,
        policy: SchemaPolicy,
        dropped: &mut u64,
    ) -> EncodeResult<RecordBatch> {
        let fields = self.schema.fields();
        let mut slots: Vec<Option<&Value>> = vec![None; fields.len()];

        for row in batch.rows() {
            slots.iter_mut().for_each(|slot| *slot = None);

            // a repeated field name keeps its last value
            for (name, value) in row.fields() {
                match self.schema.index_of(name) {
                    Some(i) => slots[i] = Some(value),
                    None if policy == SchemaPolicy::Strict => {
                        return Err(EncodeError::UnexpectedField(name.to_string()));
                    }
                    None => *dropped += 1,
                }
            }

            for ((slot, column), field) in slots.iter().zip(self.columns.iter_mut()).zip(fields) {
                if slot.is_none() && policy == SchemaPolicy::Strict {
                    return Err(EncodeError::MissingField(field.name.to_string()));
                }
                column
                    .append(*slot)
                    .map_err(|found| EncodeError::TypeMismatch {
                        field: field.name.to_string(),
                        expected: field.kind,
                        found,
                    })?;
            }
        }

        let arrays: Vec<ArrayRef> = self.columns.iter_mut().map(ColumnBuilder::finish).collect();
        let options = RecordBatchOptions::new().with_row_count(Some(batch.len()));
        Ok(RecordBatch::try_new_with_options(
            Arc::clone(&self.arrow_schema),
            arrays,
            &options,
        )?)
    }

    fn close(mut self, frames: &mut Vec<Vec<u8>>) -> EncodeResult<()> {
        self.writer.finish()?;
        frames.push(drain(&mut self.writer));
        Ok(())
    }
}

impl FrameEncoder for ColumnarEncoder {
    fn batch_capacity(&self, requested: NonZeroUsize) -> NonZeroUsize {
        requested
    }

    fn encode_batch(&mut self, batch: Batch, frames: &mut Vec<Vec<u8>>) -> EncodeResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        // frames are only handed back once the whole batch succeeded
        let mut pending = Vec::with_capacity(2);

        if let State::Uninitialized = self.state {
            let schema = SchemaInferencer::infer(&batch);
            let stream = OpenStream::start(schema, &mut pending)?;
            log_schema_frozen(&stream.schema);
            self.state = State::Open(Box::new(stream));
        }

        let before = self.dropped_fields;
        match &mut self.state {
            State::Open(stream) => {
                stream.write_batch(&batch, self.policy, &mut self.dropped_fields, &mut pending)?
            }
            State::Closed => return Err(EncodeError::Closed),
            State::Uninitialized => unreachable!("schema is frozen above"),
        }

        if self.dropped_fields > before {
            let dropped = (self.dropped_fields - before).to_string();
            let sequence = batch.sequence().to_string();
            log_event_with_fields(
                Event::FieldsDropped,
                &[("batch", sequence.as_str()), ("fields", dropped.as_str())],
            );
        }

        frames.append(&mut pending);
        Ok(())
    }

    fn finish(&mut self, frames: &mut Vec<Vec<u8>>) -> EncodeResult<()> {
        let mut pending = Vec::with_capacity(2);

        match std::mem::replace(&mut self.state, State::Closed) {
            State::Open(stream) => stream.close(&mut pending)?,
            State::Uninitialized => OpenStream::start(Schema::empty(), &mut pending)?.close(&mut pending)?,
            State::Closed => return Err(EncodeError::Closed),
        }

        frames.append(&mut pending);
        Ok(())
    }

    fn dropped_fields(&self) -> u64 {
        self.dropped_fields
    }
}

fn log_schema_frozen(schema: &Schema) {
    let names: Vec<String> = schema
        .fields()
        .iter()
        .map(|f| format!("{}:{}", f.name, f.kind))
        .collect();
    let count = schema.len().to_string();
    let fields = names.join(",");
    log_event_with_fields(
        Event::SchemaFrozen,
        &[("field_count", count.as_str()), ("fields", fields.as_str())],
    );
}

/// Copy the writer's buffer out and reset it for the next frame.
fn drain(writer: &mut StreamWriter<Vec<u8>>) -> Vec<u8> {
    let buffer = writer.get_mut();
    let frame = buffer.to_vec();
    buffer.clear();
    frame
}

fn arrow_type(kind: ValueKind) -> DataType {
    match kind {
        ValueKind::Null => DataType::Null,
        ValueKind::Boolean => DataType::Boolean,
        ValueKind::Integer => DataType::Int64,
        ValueKind::Float => DataType::Float64,
        ValueKind::Text => DataType::Utf8,
        ValueKind::Bytes => DataType::Binary,
        // rejected by ColumnBuilder::for_field before any writer exists
        ValueKind::Record => DataType::Null,
    }
}

/// Per-column array builder, reused across batches.
enum ColumnBuilder {
    Null(usize),
    Boolean(BooleanBuilder),
    Int64(Int64Builder),
    Float64(Float64Builder),
    Utf8(StringBuilder),
    Binary(BinaryBuilder),
}

impl ColumnBuilder {
    fn for_field(field: &SchemaField) -> EncodeResult<Self> {
        Ok(match field.kind {
            ValueKind::Null => ColumnBuilder::Null(0),
            ValueKind::Boolean => ColumnBuilder::Boolean(BooleanBuilder::new()),
            ValueKind::Integer => ColumnBuilder::Int64(Int64Builder::new()),
            ValueKind::Float => ColumnBuilder::Float64(Float64Builder::new()),
            ValueKind::Text => ColumnBuilder::Utf8(StringBuilder::new()),
            ValueKind::Bytes => ColumnBuilder::Binary(BinaryBuilder::new()),
            ValueKind::Record => {
                return Err(EncodeError::UnsupportedKind {
                    field: field.name.to_string(),
                    kind: field.kind,
                })
            }
        })
    }

    /// Append a value or null. On mismatch returns the offending kind.
    fn append(&mut self, value: Option<&Value>) -> Result<(), ValueKind> {
        let value = match value {
            None | Some(Value::Null) => {
                self.append_null();
                return Ok(());
            }
            Some(value) => value,
        };

        match (self, value) {
            (ColumnBuilder::Boolean(b), Value::Boolean(v)) => b.append_value(*v),
            (ColumnBuilder::Int64(b), Value::Integer(v)) => b.append_value(*v),
            (ColumnBuilder::Float64(b), Value::Float(v)) => b.append_value(*v),
            (ColumnBuilder::Float64(b), Value::Integer(v)) => b.append_value(*v as f64),
            (ColumnBuilder::Utf8(b), Value::Text(v)) => b.append_value(v),
            (ColumnBuilder::Binary(b), Value::Bytes(v)) => b.append_value(v),
            (_, other) => return Err(other.kind()),
        }
        Ok(())
    }

    fn append_null(&mut self) {
        match self {
            ColumnBuilder::Null(len) => *len += 1,
            ColumnBuilder::Boolean(b) => b.append_null(),
            ColumnBuilder::Int64(b) => b.append_null(),
            ColumnBuilder::Float64(b) => b.append_null(),
            ColumnBuilder::Utf8(b) => b.append_null(),
            ColumnBuilder::Binary(b) => b.append_null(),
        }
    }

    /// Take the accumulated array, leaving the builder empty.
    fn finish(&mut self) -> ArrayRef {
        match self {
            ColumnBuilder::Null(len) => Arc::new(NullArray::new(std::mem::take(len))),
            ColumnBuilder::Boolean(b) => Arc::new(b.finish()),
            ColumnBuilder::Int64(b) => Arc::new(b.finish()),
            ColumnBuilder::Float64(b) => Arc::new(b.finish()),
            ColumnBuilder::Utf8(b) => Arc::new(b.finish()),
            ColumnBuilder::Binary(b) => Arc::new(b.finish()),
        }
    }
}
