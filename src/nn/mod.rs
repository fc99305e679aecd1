//! Neural Network inference.

pub mod tensor;

use std::{ops::Index, ops::RangeInclusive, path::Path, sync::Arc};

use anyhow::{bail, Context};
use tract_onnx::prelude::{
    tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec, TypedFact, TypedOp,
};

use crate::image::{rect::RotatedRect, Color, Frame, Resolution};
use tensor::Tensor;

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A convolutional neural network (CNN) that operates on image data.
///
/// Like the underlying [`NeuralNetwork`], this is a cheaply [`Clone`]able handle to the underlying
/// data.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    input_res: Resolution,
    image_map: Arc<dyn Fn(&Frame, &RotatedRect) -> Tensor + Send + Sync>,
}

impl Cnn {
    /// Creates a CNN wrapper from a [`NeuralNetwork`].
    ///
    /// The network must have exactly one input with a shape that matches the given
    /// [`CnnInputShape`].
    pub fn new(
        nn: NeuralNetwork,
        shape: CnnInputShape,
        color_mapper: ColorMapper,
    ) -> anyhow::Result<Self> {
        let input_res = Self::get_input_res(&nn, shape)?;
        let (h, w) = (input_res.height() as usize, input_res.width() as usize);

        // Box a closure that maps the whole input region to a tensor, so that the layout is only
        // matched on once.
        let image_map: Arc<dyn Fn(&Frame, &RotatedRect) -> _ + Send + Sync> = match shape {
            CnnInputShape::NCHW => Arc::new(move |frame, rect| {
                Tensor::from_array_shape_fn([1, 3, h, w], |[_, c, y, x]| {
                    let color = frame.sample(rect, x as f32 / w as f32, y as f32 / h as f32);
                    color_mapper.map(color)[c]
                })
            }),
        };

        Ok(Self {
            nn,
            input_res,
            image_map,
        })
    }

    fn get_input_res(nn: &NeuralNetwork, shape: CnnInputShape) -> anyhow::Result<Resolution> {
        if nn.num_inputs() != 1 {
            bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                nn.num_inputs(),
            );
        }

        let tensor_shape = nn.input_shape(0)?;
        let (w, h) = match (shape, &*tensor_shape) {
            (CnnInputShape::NCHW, [1, 3, h, w]) => (*w, *h),
            _ => {
                bail!(
                    "invalid model input shape for {:?} CNN: {:?}",
                    shape,
                    tensor_shape,
                );
            }
        };

        let (w, h): (u32, u32) = (w.try_into()?, h.try_into()?);
        Ok(Resolution::new(w, h))
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on a region of a frame, returning the estimated outputs.
    ///
    /// The region is sampled to create the network's input tensor. If its aspect ratio does not
    /// match the network's input aspect ratio, the image will be stretched.
    pub fn estimate(&self, frame: &Frame, region: &RotatedRect) -> anyhow::Result<Outputs> {
        let tensor = (self.image_map)(frame, region);
        self.nn.estimate(&Inputs::from(tensor))
    }
}

enum ColorMapperKind {
    Linear { target_range: RangeInclusive<f32> },
}

/// Maps 8-bit colors to the value range a network expects.
pub struct ColorMapper {
    kind: ColorMapperKind,
}

impl ColorMapper {
    /// Creates a simple color mapper that uniformly maps sRGB values to `target_range`.
    ///
    /// Note that this operates on *non-linear* sRGB colors, but maps them linearly to the target
    /// range.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        let start = *target_range.start();
        let end = *target_range.end();
        assert!(end > start);

        Self {
            kind: ColorMapperKind::Linear { target_range },
        }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        match &self.kind {
            ColorMapperKind::Linear { target_range } => {
                let start = *target_range.start();
                let end = *target_range.end();

                let adjust_range = (end - start) / 255.0;
                let rgb = [color.r(), color.g(), color.b()];
                rgb.map(|col| col as f32 * adjust_range + start)
            }
        }
    }
}

/// Describes in what order a CNN expects its input image data.
///
/// - `N` is the number of images, often fixed at 1.
/// - `C` is the number of color channels, often 3 for RGB inputs.
/// - `H` and `W` are the height and width of the input, respectively.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CnnInputShape {
    /// Shape is `[N, C, H, W]`.
    NCHW,
}

/// Neural network loader.
pub struct Loader {
    model_data: Vec<u8>,
}

impl Loader {
    /// Loads and optimizes the network.
    ///
    /// Returns an error if the network data is malformed, if the network data is incomplete, or if
    /// the network uses unimplemented operations.
    pub fn load(self) -> anyhow::Result<NeuralNetwork> {
        let graph = tract_onnx::onnx()
            .model_for_read(&mut &*self.model_data)?
            .into_optimized()?;
        let model = SimplePlan::new(graph)?;

        Ok(NeuralNetwork(Arc::new(model)))
    }
}

/// A neural network that can be used for inference.
///
/// This is a cheaply [`Clone`]able handle to the underlying network structures.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Model>);

impl NeuralNetwork {
    /// Loads a pre-trained model from an ONNX file path.
    ///
    /// The path must have a `.onnx` extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Loader> {
        Self::from_path_impl(path.as_ref())
    }

    fn from_path_impl(path: &Path) -> anyhow::Result<Loader> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => bail!("neural network file must have `.onnx` extension"),
        }

        let model_data = std::fs::read(path)
            .with_context(|| format!("failed to read network from '{}'", path.display()))?;
        Ok(Self::from_onnx(model_data))
    }

    /// Loads a pre-trained model from an in-memory ONNX file.
    pub fn from_onnx(raw: impl Into<Vec<u8>>) -> Loader {
        Loader {
            model_data: raw.into(),
        }
    }

    /// Returns the number of input nodes of the network.
    pub fn num_inputs(&self) -> usize {
        self.0.model().inputs.len()
    }

    /// Returns the tensor shape of input `index`.
    ///
    /// Returns an error if the network does not have that input, or if its shape is symbolic.
    pub fn input_shape(&self, index: usize) -> anyhow::Result<TVec<usize>> {
        let fact = self.0.model().input_fact(index)?;
        let shape = fact
            .shape
            .as_concrete()
            .with_context(|| format!("network input #{index} has a symbolic shape"))?;
        Ok(shape.into())
    }

    /// Runs the network on a set of [`Inputs`], returning the estimated [`Outputs`].
    #[doc(alias = "infer")]
    pub fn estimate(&self, inputs: &Inputs) -> anyhow::Result<Outputs> {
        let inputs = inputs
            .iter()
            .map(|t| Ok(TValue::from_const(Arc::new(t.to_tract()?))))
            .collect::<anyhow::Result<TVec<_>>>()?;
        let outputs = self.0.run(inputs)?;
        let outputs = outputs
            .iter()
            .map(|tract| Tensor::from_tract(tract))
            .collect::<anyhow::Result<_>>()?;
        Ok(Outputs { inner: outputs })
    }
}

/// The result of a neural network inference pass.
///
/// This is a list of tensors corresponding to the network's output nodes.
#[derive(Debug)]
pub struct Outputs {
    inner: TVec<Tensor>,
}

impl Outputs {
    /// Returns the number of tensors in this inference output.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Index<usize> for Outputs {
    type Output = Tensor;

    fn index(&self, index: usize) -> &Tensor {
        &self.inner[index]
    }
}

impl FromIterator<Tensor> for Outputs {
    fn from_iter<T: IntoIterator<Item = Tensor>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

/// List of input tensors for neural network inference.
#[derive(Debug)]
pub struct Inputs {
    inner: TVec<Tensor>,
}

impl Inputs {
    fn iter(&self) -> impl Iterator<Item = &Tensor> {
        self.inner.iter()
    }
}

impl From<Tensor> for Inputs {
    fn from(t: Tensor) -> Self {
        Self { inner: tvec![t] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mapper() {
        let mapper = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [-1.0, -1.0, -1.0]);
        assert_eq!(mapper.map(Color::WHITE), [1.0, 1.0, 1.0]);

        let mapper = ColorMapper::linear(0.0..=1.0);
        assert_eq!(mapper.map(Color::RED), [1.0, 0.0, 0.0]);
        assert_eq!(mapper.map(Color::BLUE), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn rejects_non_onnx_path() {
        let err = NeuralNetwork::from_path("models/hand_landmark_full.tflite").err();
        assert!(err.is_some());
    }

    #[test]
    fn missing_model_file() {
        let err = NeuralNetwork::from_path("/nonexistent/model.onnx").err();
        let msg = format!("{:#}", err.unwrap());
        assert!(msg.contains("/nonexistent/model.onnx"), "{msg}");
    }

    #[test]
    fn malformed_model() {
        let result = NeuralNetwork::from_onnx(&b"definitely not protobuf"[..]).load();
        assert!(result.is_err());
    }
}
